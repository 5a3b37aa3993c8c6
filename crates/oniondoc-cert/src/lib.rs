#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cognitive_complexity)]
#![warn(clippy::manual_ok_or)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::unseparated_literal_suffix)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::uninlined_format_args)]

mod encode;
mod err;
pub mod rsa;

use oniondoc_bytes::{Error as BytesError, Result as BytesResult};
use oniondoc_bytes::{Readable, Reader};
use oniondoc_llcrypto::pk::ed25519::{self, ValidatableEd25519Signature, Verifier as _};

use std::fmt;
use std::time;

pub use encode::{Ed25519CertConstructor, EncodedEd25519Cert};
pub use err::{CertEncodeError, CertError};

/// A Result defined to use CertError.
type CertResult<T> = std::result::Result<T, CertError>;

/// The clock-skew allowance applied when *issuing* a certificate.
///
/// A caller may issue a certificate whose expiration lies up to this long
/// in the past, to tolerate minor clock disagreement.  No such allowance
/// is ever applied when verifying.
pub const CREATE_SKEW_ALLOWANCE: time::Duration = time::Duration::from_secs(10);

/// Recognized values for a certificate's type field.
///
/// In the names used here, "X_V_Y" means "key X verifying key Y", whereas
/// "X_CC_Y" means "key X cross-certifying key Y".  In both cases, X is the
/// key that is doing the signing, and Y is the key or object that is
/// getting signed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CertType(u8);

impl CertType {
    /// The blinded identity key certifying a short-term descriptor signing
    /// key.
    pub const HS_BLINDED_ID_V_SIGNING: CertType = CertType(0x08);
    /// The descriptor signing key certifying an introduction-point
    /// authentication key.
    pub const HS_IP_V_SIGNING: CertType = CertType(0x09);
    /// The descriptor signing key certifying an introduction-point
    /// encryption key (converted to ed25519).
    pub const HS_IP_CC_SIGNING: CertType = CertType(0x0B);
}

impl From<u8> for CertType {
    fn from(n: u8) -> Self {
        CertType(n)
    }
}
impl From<CertType> for u8 {
    fn from(t: CertType) -> u8 {
        t.0
    }
}
impl fmt::Display for CertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CertType::HS_BLINDED_ID_V_SIGNING => write!(f, "HS_BLINDED_ID_V_SIGNING"),
            CertType::HS_IP_V_SIGNING => write!(f, "HS_IP_V_SIGNING"),
            CertType::HS_IP_CC_SIGNING => write!(f, "HS_IP_CC_SIGNING"),
            CertType(n) => write!(f, "{:#04x}", n),
        }
    }
}

/// Extension identifiers for extensions in certificates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ExtType(u8);

impl ExtType {
    /// Extension indicating an Ed25519 key that signed this certificate.
    ///
    /// Certificates do not always contain the key that signed them.
    pub const SIGNED_WITH_ED25519_KEY: ExtType = ExtType(0x04);
}

impl From<u8> for ExtType {
    fn from(n: u8) -> Self {
        ExtType(n)
    }
}
impl From<ExtType> for u8 {
    fn from(t: ExtType) -> u8 {
        t.0
    }
}

/// Identifiers for the type of key or object getting signed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct KeyType(u8);

impl KeyType {
    /// Identifier for an Ed25519 key.
    pub const ED25519_KEY: KeyType = KeyType(0x01);
    /// Identifier for the SHA256 of a DER-encoded RSA key.
    pub const SHA256_OF_RSA: KeyType = KeyType(0x02);
}

impl From<u8> for KeyType {
    fn from(n: u8) -> Self {
        KeyType(n)
    }
}
impl From<KeyType> for u8 {
    fn from(t: KeyType) -> u8 {
        t.0
    }
}

/// Structure for a fixed-shape Ed25519-signed certificate.
#[derive(Debug, Clone)]
pub struct Ed25519Cert {
    /// How many _hours_ after the epoch will this certificate expire?
    exp_hours: u32,
    /// Type of the certificate.
    cert_type: CertType,
    /// The key or object being certified.
    cert_key: CertifiedKey,
    /// A list of extensions.
    #[allow(unused)]
    extensions: Vec<CertExt>,
    /// The key that signed this cert.
    ///
    /// Once the cert has been unwrapped from a KeyUnknownCert, this field
    /// will be set.  If there is a `SignedWithEd25519` extension in
    /// `self.extensions`, this will match it.
    signed_with: Option<ed25519::Ed25519Identity>,
}

/// One of the data types that can be certified by an Ed25519Cert.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CertifiedKey {
    /// An Ed25519 public key, signed directly.
    Ed25519(ed25519::Ed25519Identity),
    /// The SHA256 digest of a DER-encoded RSA public key.
    RsaSha256Digest([u8; 32]),
    /// Some unrecognized key type.
    Unrecognized(UnrecognizedKey),
}

/// A key whose type we didn't recognize.
#[derive(Debug, Clone)]
pub struct UnrecognizedKey {
    /// Actual type of the key.
    key_type: KeyType,
    /// Digest of the key, or the key itself.
    key_digest: [u8; 32],
}

impl CertifiedKey {
    /// Return the byte that identifies the type of this key.
    pub fn key_type(&self) -> KeyType {
        match self {
            CertifiedKey::Ed25519(_) => KeyType::ED25519_KEY,
            CertifiedKey::RsaSha256Digest(_) => KeyType::SHA256_OF_RSA,
            CertifiedKey::Unrecognized(u) => u.key_type,
        }
    }
    /// Return the bytes that are used for the body of this certified key
    /// or object.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            CertifiedKey::Ed25519(k) => k.as_bytes(),
            CertifiedKey::RsaSha256Digest(k) => &k[..],
            CertifiedKey::Unrecognized(u) => &u.key_digest[..],
        }
    }
    /// If this is an Ed25519 public key, return Some(key).
    /// Otherwise, return None.
    pub fn as_ed25519(&self) -> Option<&ed25519::Ed25519Identity> {
        match self {
            CertifiedKey::Ed25519(k) => Some(k),
            _ => None,
        }
    }
    /// Try to extract a CertifiedKey from a Reader, given that we have
    /// already read its type as `key_type`.
    fn from_reader(key_type: KeyType, r: &mut Reader<'_>) -> BytesResult<Self> {
        Ok(match key_type {
            KeyType::ED25519_KEY => CertifiedKey::Ed25519(r.extract()?),
            KeyType::SHA256_OF_RSA => CertifiedKey::RsaSha256Digest(r.extract()?),
            _ => CertifiedKey::Unrecognized(UnrecognizedKey {
                key_type,
                key_digest: r.extract()?,
            }),
        })
    }
}

/// An extension in a certificate.
#[derive(Debug, Clone)]
enum CertExt {
    /// Indicates which Ed25519 public key signed this cert.
    SignedWithEd25519(SignedWithEd25519Ext),
    /// An extension whose identity we don't recognize.
    Unrecognized(UnrecognizedExt),
}

/// Any unrecognized extension on a certificate.
#[derive(Debug, Clone)]
#[allow(unused)]
struct UnrecognizedExt {
    /// True iff this extension must be understood in order to validate
    /// the certificate.
    affects_validation: bool,
    /// The type of the extension.
    ext_type: ExtType,
    /// The body of the extension.
    body: Vec<u8>,
}

impl CertExt {
    /// Return the identifier code for this Extension.
    fn ext_id(&self) -> ExtType {
        match self {
            CertExt::SignedWithEd25519(_) => ExtType::SIGNED_WITH_ED25519_KEY,
            CertExt::Unrecognized(u) => u.ext_type,
        }
    }
}

/// Extension indicating a key that signed a given certificate.
#[derive(Debug, Clone)]
struct SignedWithEd25519Ext {
    /// The key that signed the certificate including this extension.
    pk: ed25519::Ed25519Identity,
}

impl Readable for CertExt {
    fn take_from(b: &mut Reader<'_>) -> BytesResult<Self> {
        let len = b.take_u16()?;
        let ext_type: ExtType = b.take_u8()?.into();
        let flags = b.take_u8()?;
        let body = b.take(len as usize)?;

        Ok(match ext_type {
            ExtType::SIGNED_WITH_ED25519_KEY => CertExt::SignedWithEd25519(SignedWithEd25519Ext {
                pk: ed25519::Ed25519Identity::from_bytes(body).ok_or_else(|| {
                    BytesError::InvalidMessage("wrong length on Ed25519 key".into())
                })?,
            }),
            _ => {
                if (flags & 1) != 0 {
                    return Err(BytesError::InvalidMessage(
                        "unrecognized certificate extension, with 'affects_validation' flag set."
                            .into(),
                    ));
                }
                CertExt::Unrecognized(UnrecognizedExt {
                    affects_validation: false,
                    ext_type,
                    body: body.into(),
                })
            }
        })
    }
}

impl Ed25519Cert {
    /// Try to decode a certificate from a byte slice.
    ///
    /// This function returns an error if the byte slice is not completely
    /// exhausted.
    ///
    /// Note that the resulting KeyUnknownCert is not checked for validity
    /// at all: you will need to provide it with an expected signing key,
    /// then check it for signature and timeliness.
    pub fn decode(cert: &[u8]) -> BytesResult<KeyUnknownCert> {
        let mut r = Reader::from_slice(cert);
        let v = r.take_u8()?;
        if v != 1 {
            // This would be something other than a "v1" certificate. We
            // don't understand those.
            return Err(BytesError::InvalidMessage(
                "Unrecognized certificate version".into(),
            ));
        }
        let cert_type = r.take_u8()?.into();
        let exp_hours = r.take_u32()?;
        let cert_key_type = r.take_u8()?.into();
        let cert_key = CertifiedKey::from_reader(cert_key_type, &mut r)?;
        let n_exts = r.take_u8()?;
        let mut extensions = Vec::new();
        for _ in 0..n_exts {
            let e: CertExt = r.extract()?;
            extensions.push(e);
        }

        let sig_offset = r.consumed();
        let signature: ed25519::Signature = r.extract()?;
        r.should_be_exhausted()?;

        let keyext = extensions
            .iter()
            .find(|e| e.ext_id() == ExtType::SIGNED_WITH_ED25519_KEY);

        let included_pkey = match keyext {
            Some(CertExt::SignedWithEd25519(s)) => Some(s.pk),
            _ => None,
        };

        Ok(KeyUnknownCert {
            cert: UncheckedCert {
                cert: Ed25519Cert {
                    exp_hours,
                    cert_type,
                    cert_key,
                    extensions,

                    signed_with: included_pkey,
                },
                text: cert[0..sig_offset].into(),
                signature,
            },
        })
    }

    /// Return the time at which this certificate becomes expired.
    pub fn expiry(&self) -> time::SystemTime {
        let d = time::Duration::new(u64::from(self.exp_hours) * 3600, 0);
        time::SystemTime::UNIX_EPOCH + d
    }

    /// Return true iff this certificate will be expired at the time `when`.
    pub fn is_expired_at(&self, when: time::SystemTime) -> bool {
        when >= self.expiry()
    }

    /// Return the signed key or object that is authenticated by this
    /// certificate.
    pub fn subject_key(&self) -> &CertifiedKey {
        &self.cert_key
    }

    /// Return the ed25519 key that signed this certificate.
    pub fn signing_key(&self) -> Option<&ed25519::Ed25519Identity> {
        self.signed_with.as_ref()
    }

    /// Return the type of this certificate.
    pub fn cert_type(&self) -> CertType {
        self.cert_type
    }
}

/// A parsed Ed25519 certificate.  Maybe it includes its signing key;
/// maybe it doesn't.
///
/// To validate this cert, either it must contain its signing key,
/// or the caller must know the signing key.  In the first case, call
/// [`should_have_signing_key`](KeyUnknownCert::should_have_signing_key);
/// in the latter, call
/// [`should_be_signed_with`](KeyUnknownCert::should_be_signed_with).
#[derive(Clone, Debug)]
pub struct KeyUnknownCert {
    /// The certificate whose signing key might not be known.
    cert: UncheckedCert,
}

impl KeyUnknownCert {
    /// Return the certificate type of the underlying cert.
    pub fn peek_cert_type(&self) -> CertType {
        self.cert.cert.cert_type
    }
    /// Return the subject key of the underlying cert.
    pub fn peek_subject_key(&self) -> &CertifiedKey {
        &self.cert.cert.cert_key
    }

    /// Declare that this should be a self-contained certificate that
    /// contains its own signing key.
    ///
    /// On success, this certificate did indeed turn out to be
    /// self-contained, and so we can validate it.
    /// On failure, this certificate was not self-contained.
    pub fn should_have_signing_key(self) -> CertResult<UncheckedCert> {
        let real_key = match &self.cert.cert.signed_with {
            Some(a) => *a,
            None => return Err(CertError::MissingPubKey),
        };

        Ok(UncheckedCert {
            cert: Ed25519Cert {
                signed_with: Some(real_key),
                ..self.cert.cert
            },
            ..self.cert
        })
    }

    /// Declare that this should be a certificate signed with a given key.
    ///
    /// On success, this certificate either listed the provided key, or did
    /// not list any key: in either case, we can validate it.
    /// On failure, this certificate claims to be signed with a different
    /// key.
    pub fn should_be_signed_with(
        self,
        pkey: &ed25519::Ed25519Identity,
    ) -> CertResult<UncheckedCert> {
        let real_key = match &self.cert.cert.signed_with {
            Some(a) if a == pkey => *pkey,
            None => *pkey,
            Some(_) => return Err(CertError::KeyMismatch),
        };

        Ok(UncheckedCert {
            cert: Ed25519Cert {
                signed_with: Some(real_key),
                ..self.cert.cert
            },
            ..self.cert
        })
    }
}

/// A certificate that has been parsed, but whose signature and timeliness
/// have not been checked.
#[derive(Debug, Clone)]
pub struct UncheckedCert {
    /// The parsed certificate, possibly modified by inserting an
    /// externally supplied key as its signing key.
    cert: Ed25519Cert,

    /// The signed text of the certificate.  (Checking ed25519 signatures
    /// forces us to store this.)
    text: Vec<u8>,

    /// The alleged signature.
    signature: ed25519::Signature,
}

/// A certificate that has been parsed and signature-checked, but whose
/// timeliness has not been checked.
pub struct SigCheckedCert {
    /// The certificate that might or might not be timely.
    cert: Ed25519Cert,
}

impl UncheckedCert {
    /// Split this unchecked cert into a component that assumes it has been
    /// checked, and a signature to validate.
    ///
    /// This is useful when a batch of certificate signatures is to be
    /// validated all at once.
    pub fn dangerously_split(
        self,
    ) -> CertResult<(SigCheckedCert, ValidatableEd25519Signature)> {
        let signing_key = self.cert.signed_with.ok_or(CertError::MissingPubKey)?;
        let signing_key = signing_key
            .try_into()
            .map_err(|_| CertError::BadSignature)?;
        let signature =
            ValidatableEd25519Signature::new(signing_key, self.signature, &self.text[..]);
        Ok((SigCheckedCert { cert: self.cert }, signature))
    }

    /// Check the signature on this certificate.
    pub fn check_signature(self) -> CertResult<SigCheckedCert> {
        let pubkey = &self.cert.signed_with.ok_or(CertError::MissingPubKey)?;
        let pubkey: ed25519::PublicKey = pubkey.try_into().map_err(|_| CertError::BadSignature)?;

        pubkey
            .verify(&self.text[..], &self.signature)
            .map_err(|_| CertError::BadSignature)?;

        Ok(SigCheckedCert { cert: self.cert })
    }

    /// Return the subject key of the underlying cert.
    pub fn peek_subject_key(&self) -> &CertifiedKey {
        &self.cert.cert_key
    }
    /// Return the signing key of the underlying cert.
    pub fn peek_signing_key(&self) -> &ed25519::Ed25519Identity {
        self.cert
            .signed_with
            .as_ref()
            .expect("Made an UncheckedCert without a signing key")
    }
}

impl SigCheckedCert {
    /// Unwrap this certificate if it is not expired at `when`.
    pub fn check_valid_at(self, when: &time::SystemTime) -> CertResult<Ed25519Cert> {
        if self.cert.is_expired_at(*when) {
            return Err(CertError::Expired);
        }
        Ok(self.cert)
    }

    /// Return the certificate without checking whether it is expired.
    ///
    /// This is appropriate when the caller intends to perform the
    /// timeliness check itself, for example because it wants to combine
    /// the expiration times of several objects.
    pub fn dangerously_assume_timely(self) -> Ed25519Cert {
        self.cert
    }
}
