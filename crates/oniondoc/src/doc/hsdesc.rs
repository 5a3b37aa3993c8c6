//! Implementation for onion service descriptors.
//!
//! An onion service descriptor is a document generated by an onion service
//! and published through the anonymity network for clients to later fetch.
//! It tells the client where to find the current introduction points for
//! the onion service, and how to contact them.
//!
//! A descriptor is more complicated than most other document types,
//! because it is partially encrypted: an outer signed plaintext envelope
//! wraps an encrypted inner document listing the introduction points.

mod build;
mod desc_enc;
mod inner;
mod outer;

pub use build::{HsDescBuilder, HsDescBuilderError, NetdocBuilder};
pub use desc_enc::DecryptionError;

use crate::linkspec::LinkSpec;
use crate::{Error, NetdocErrorKind as EK};

use oniondoc_cert::rsa::EncodedRsaCrosscert;
use oniondoc_hscrypto::pk::{HsBlindId, HsIntroAuthKey, HsIntroEncKey};
use oniondoc_hscrypto::{RevisionCounter, Subcredential};
use oniondoc_llcrypto::pk::ed25519::Ed25519Identity;
use oniondoc_llcrypto::pk::{rsa, validate_all_sigs, ValidatableSignature as _};

use smallvec::SmallVec;

use std::time::SystemTime;

use desc_enc::{HsDescEncryption, MAC_LEN, PLAINTEXT_ALIGN, SALT_LEN};

/// The longest an encoded descriptor is allowed to be, in bytes: 50 KiB.
///
/// Decoding rejects longer inputs before parsing anything; encoding
/// refuses to produce a longer document.
pub const HS_DESC_MAX_LEN: usize = 50 * 1024;

/// The personalization string mixed into the envelope key derivation.
const HS_DESC_ENCRYPTION_STRING_CONST: &[u8] = b"hsdir-encrypted-data";

/// Return true if `v` names a descriptor version this crate implements.
pub fn is_supported_version(v: u32) -> bool {
    (outer::HS_DESC_VERSION_MIN..=outer::HS_DESC_VERSION_MAX).contains(&v)
}

/// Return true if `n` is a plausible length for the encrypted body of a
/// descriptor.
///
/// A valid body consists of a salt, at least one aligned block of padded
/// plaintext, and a MAC, and fits in the maximum descriptor length.
pub fn encrypted_data_length_is_valid(n: usize) -> bool {
    n >= SALT_LEN + MAC_LEN + PLAINTEXT_ALIGN
        && (n - SALT_LEN - MAC_LEN) % PLAINTEXT_ALIGN == 0
        && n <= HS_DESC_MAX_LEN
}

/// An error that prevented us from decoding and validating an onion
/// service descriptor.
///
/// Errors carry the grammar rule or check that was violated; they never
/// echo back input bytes.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HsDescError {
    /// The document (or its decrypted body) violated the grammar.
    #[error("Malformed onion service descriptor")]
    Malformed(#[source] Error),
    /// The document's version was outside the supported range.
    #[error("Unsupported descriptor version")]
    UnsupportedVersion(#[source] Error),
    /// The input, or the decrypted body, was larger than permitted.
    #[error("Descriptor too large")]
    TooLarge,
    /// The signature on the descriptor could not be verified.
    #[error("Invalid signature on onion service descriptor")]
    BadSignature(#[source] Error),
    /// An embedded certificate had the wrong purpose or subject, lacked
    /// its signing-key extension, or failed signature verification.
    #[error("Invalid certificate in onion service descriptor")]
    BadCertificate(#[source] Error),
    /// An embedded certificate was expired at the provided time.
    #[error("Expired certificate in onion service descriptor")]
    Expired,
    /// The encrypted body had an invalid shape, or failed its integrity
    /// check.
    #[error("Unable to open descriptor envelope")]
    BadEnvelope,
    /// A specific introduction-point record was invalid.
    #[error("Invalid introduction point in onion service descriptor")]
    BadIntroPoint(#[source] Error),
    /// An introduction point used an encryption-key algorithm we don't
    /// recognize.
    #[error("Unrecognized introduction-point key type")]
    UnknownKeyType,
}

/// A type of authentication that is required when introducing to an onion
/// service.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Eq, PartialEq, derive_more::Display)]
pub enum IntroAuthType {
    /// Ed25519 authentication is required.
    #[display("ed25519")]
    Ed25519,
}

/// The encryption key advertised for one introduction point.
///
/// Almost all services advertise a Curve25519 key; services that have not
/// finished migrating may still advertise a legacy RSA key, bound to the
/// blinded identity by a cross-certificate.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum IntroEncKey {
    /// A Curve25519 key, certified by the descriptor signing key.
    Ntor(HsIntroEncKey),
    /// A legacy RSA-1024 key, with the cross-certificate that binds it to
    /// the blinded identity.
    Legacy {
        /// The RSA public key itself.
        key: rsa::PublicKey,
        /// The cross-certificate, kept in its encoded form so that the
        /// record can be re-encoded verbatim.
        crosscert: EncodedRsaCrosscert,
    },
}

/// Information in an onion service descriptor about a single introduction
/// point.
#[derive(Debug, Clone, PartialEq)]
pub struct IntroPointDesc {
    /// The list of link specifiers saying how to reach the introduction
    /// point.
    ///
    /// These can include addresses and identity keys.  At least one is
    /// always present, though none of them needs to be an address.
    link_specifiers: Vec<LinkSpec>,
    /// The key used to identify the onion service at this introduction
    /// point.
    auth_key: HsIntroAuthKey,
    /// The key used to encrypt a client's first message to the onion
    /// service when using this introduction point.
    enc_key: IntroEncKey,
}

impl IntroPointDesc {
    /// Construct a description of an introduction point.
    pub fn new(
        link_specifiers: Vec<LinkSpec>,
        auth_key: HsIntroAuthKey,
        enc_key: IntroEncKey,
    ) -> Self {
        IntroPointDesc {
            link_specifiers,
            auth_key,
            enc_key,
        }
    }

    /// The list of link specifiers for reaching the introduction point.
    pub fn link_specifiers(&self) -> &[LinkSpec] {
        &self.link_specifiers
    }

    /// The key used to identify the onion service at this introduction
    /// point.
    pub fn auth_key(&self) -> &HsIntroAuthKey {
        &self.auth_key
    }

    /// The encryption key advertised for this introduction point.
    pub fn enc_key(&self) -> &IntroEncKey {
        &self.enc_key
    }
}

/// A decrypted, decoded, and validated onion service descriptor.
///
/// This object includes information from both the outer (plaintext)
/// document of the descriptor and the inner (encrypted) document.  It
/// tells the client everything it needs to contact the onion service.
#[derive(Debug, Clone, PartialEq)]
pub struct HsDesc {
    /// The lifetime of this descriptor, in minutes.
    lifetime: u16,
    /// The expiration time of the `descriptor-signing-key-cert` included
    /// in this descriptor.
    signing_cert_expires: SystemTime,
    /// The revision counter of this descriptor: higher values supersede
    /// lower ones.
    revision: RevisionCounter,
    /// The create-handshake types this onion service accepts.
    create2_formats: Vec<u16>,
    /// The list of authentication types that this onion service requires,
    /// if any.
    auth_required: Option<SmallVec<[IntroAuthType; 2]>>,
    /// The advertised introduction points, in the order they appeared.
    intro_points: Vec<IntroPointDesc>,
}

/// Convert an error from the outer document parser into an [`HsDescError`].
fn map_outer_err(e: Error) -> HsDescError {
    match e.netdoc_error_kind() {
        EK::BadDocumentVersion => HsDescError::UnsupportedVersion(e),
        EK::BadCertificate => HsDescError::BadCertificate(e),
        EK::BadSignature => HsDescError::BadSignature(e),
        _ => HsDescError::Malformed(e),
    }
}

/// Convert an error from the inner document parser into an [`HsDescError`].
fn map_inner_err(e: inner::InnerError) -> HsDescError {
    use inner::InnerError as IE;
    match e {
        IE::Header(e) => HsDescError::Malformed(e),
        IE::IntroPoint(e) => {
            if e.netdoc_error_kind() == EK::BadCertificate {
                HsDescError::BadCertificate(e)
            } else {
                HsDescError::BadIntroPoint(e)
            }
        }
        IE::UnknownEncKeyType => HsDescError::UnknownKeyType,
    }
}

impl HsDesc {
    /// Parse, decrypt and validate the descriptor in `input`.
    ///
    /// This function:
    ///   * rejects inputs longer than [`HS_DESC_MAX_LEN`] before parsing;
    ///   * parses the outer document, and checks that its identity is
    ///     consistent with `blinded_id`;
    ///   * verifies the certificate and document signatures, and checks
    ///     their timeliness at `valid_at` (the caller's clock);
    ///   * opens the encrypted envelope.  If `subcredential` is provided,
    ///     it is mixed into the envelope keys (the client-authorized
    ///     path); otherwise only the non-client-auth path is attempted;
    ///   * parses and validates the inner document and every
    ///     introduction-point record in it.
    ///
    /// Any failure aborts the whole operation: no partially validated
    /// descriptor is ever returned.
    pub fn parse_decrypt_validate(
        input: &str,
        blinded_id: &HsBlindId,
        subcredential: Option<&Subcredential>,
        valid_at: SystemTime,
    ) -> Result<HsDesc, HsDescError> {
        use HsDescError as E;
        if input.len() > HS_DESC_MAX_LEN {
            return Err(E::TooLarge);
        }

        let unchecked = outer::HsDescOuter::parse(input).map_err(map_outer_err)?;

        // The descriptor must belong to the identity we were asked about.
        // (Without this check it would be easy to forget to compare them.)
        if &unchecked.desc.blinded_id() != blinded_id {
            return Err(E::BadCertificate(
                EK::BadCertificate.with_msg("Descriptor did not have the expected identity"),
            ));
        }

        // First the certificate signature, then the document signature,
        // then timeliness.
        if !unchecked.cert_signature.is_valid() {
            return Err(E::BadCertificate(
                EK::BadCertificate.with_msg("Invalid signature on signing-key certificate"),
            ));
        }
        if !unchecked.doc_signature.is_valid() {
            return Err(E::BadSignature(
                EK::BadSignature.with_msg("Descriptor signature verification failed"),
            ));
        }
        if valid_at >= unchecked.cert_expiry {
            return Err(E::Expired);
        }

        let outer_doc = unchecked.desc;
        let desc_sign_key_id = *outer_doc.desc_sign_key_id();

        // Open the envelope.
        let n = outer_doc.encrypted.len();
        if n > HS_DESC_MAX_LEN {
            return Err(E::TooLarge);
        }
        if !encrypted_data_length_is_valid(n) {
            return Err(E::BadEnvelope);
        }
        let decrypt = HsDescEncryption {
            blinded_id,
            subcredential,
            string_const: HS_DESC_ENCRYPTION_STRING_CONST,
        };
        let mut body = decrypt
            .decrypt(&outer_doc.encrypted[..])
            .map_err(|_| E::BadEnvelope)?;
        // The inner grammar is self-delimited, so the zero padding can be
        // stripped without recording the original length anywhere.
        let n_padding = body.iter().rev().take_while(|b| **b == 0).count();
        body.truncate(body.len() - n_padding);
        let body = std::str::from_utf8(&body[..]).map_err(|_| {
            E::Malformed(EK::BadObjectVal.with_msg("Decrypted body was not valid UTF-8"))
        })?;

        // Parse the inner document.
        let blinded_ed = Ed25519Identity::new(*blinded_id.as_ref());
        let (cert_signing_key, inner_doc, signatures, inner_expiry) =
            inner::HsDescInner::parse(body, &blinded_ed).map_err(map_inner_err)?;

        // Every certificate in the inner document must have been issued by
        // the signing key named in the outer document.
        if let Some(signing_key) = cert_signing_key {
            if signing_key != desc_sign_key_id {
                return Err(E::BadCertificate(EK::BadCertificate.with_msg(
                    "Signing keys in inner document did not match those in outer document",
                )));
            }
        }
        if !validate_all_sigs(&signatures) {
            return Err(E::BadCertificate(
                EK::BadCertificate
                    .with_msg("Invalid signature on an introduction-point certificate"),
            ));
        }
        if let Some(expiry) = inner_expiry {
            if valid_at >= expiry {
                return Err(E::Expired);
            }
        }

        Ok(HsDesc {
            lifetime: outer_doc.lifetime,
            signing_cert_expires: unchecked.cert_expiry,
            revision: outer_doc.revision_counter,
            create2_formats: inner_doc.create2_formats,
            auth_required: inner_doc.auth_required,
            intro_points: inner_doc.intro_points,
        })
    }

    /// The lifetime of this descriptor, in minutes.
    pub fn lifetime_minutes(&self) -> u16 {
        self.lifetime
    }

    /// When the signing-key certificate in this descriptor expires.
    pub fn signing_cert_expires(&self) -> SystemTime {
        self.signing_cert_expires
    }

    /// The revision counter of this descriptor.
    pub fn revision_counter(&self) -> RevisionCounter {
        self.revision
    }

    /// The create-handshake types this onion service accepts.
    ///
    /// Always non-empty.
    pub fn create2_formats(&self) -> &[u16] {
        &self.create2_formats
    }

    /// The advertised introduction points, in the order in which they were
    /// listed.
    ///
    /// (May be empty: a service may publish a descriptor with no
    /// introduction points, for example to declare itself down.)
    pub fn intro_points(&self) -> &[IntroPointDesc] {
        &self.intro_points
    }

    /// Return true if this onion service claims to require authentication
    /// of some kind in its introduction protocol.
    pub fn requires_intro_authentication(&self) -> bool {
        self.auth_required.is_some()
    }

    /// The authentication types this onion service requires, if any.
    pub fn auth_required(&self) -> Option<&[IntroAuthType]> {
        self.auth_required.as_deref()
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::encode::NetdocEncoder;
    use oniondoc_cert::{CertType, CertifiedKey, Ed25519Cert};
    use oniondoc_cert::rsa::RsaCrosscert;
    use oniondoc_hscrypto::pk::{HsBlindIdKeypair, HsIdKeypair};
    use oniondoc_llcrypto::pk::ed25519::{self, ExpandedKeypair, Signer as _};
    use oniondoc_llcrypto::pk::{curve25519, rsa};

    use base64ct::{Base64Unpadded, Encoding};
    use rand::rngs::StdRng;
    use rand::SeedableRng as _;

    use std::net::IpAddr;
    use std::time::{Duration, SystemTime};

    /// The identity fingerprint used for the legacy-id link specifiers.
    const LEGACY_RELAY_ID: &str = "0299F268FCA9D55CD157976D39AE92B4B455B3A8";

    /// Key material for building one descriptor.
    struct TestService {
        blinded: HsBlindIdKeypair,
        hs_desc_sign: ed25519::Keypair,
        now: SystemTime,
        cert_expiry: SystemTime,
    }

    impl TestService {
        fn new(rng: &mut StdRng) -> Self {
            let hs_id = ed25519::Keypair::generate(rng);
            let id_keypair = HsIdKeypair::from(ExpandedKeypair::from(&hs_id));
            let blinded = id_keypair.compute_blinded_key([5; 32]).unwrap();
            let hs_desc_sign = ed25519::Keypair::generate(rng);
            // An exact-hour expiration, so that the rounded-to-hours
            // encoding of the certificates does not move it.
            let cert_expiry = humantime::parse_rfc3339("2023-01-26T03:00:00Z").unwrap();
            let now = humantime::parse_rfc3339("2023-01-23T15:00:00Z").unwrap();
            TestService {
                blinded,
                hs_desc_sign,
                now,
                cert_expiry,
            }
        }

        /// A builder with every field except the introduction points
        /// filled in.
        fn builder<'a>(&'a self, intro_points: &'a [IntroPointDesc]) -> HsDescBuilder<'a> {
            HsDescBuilder::default()
                .blinded_id(&self.blinded)
                .hs_desc_sign(&self.hs_desc_sign)
                .hs_desc_sign_cert_expiry(self.cert_expiry)
                .create2_formats(&[2])
                .auth_required(None)
                .intro_points(intro_points)
                .intro_auth_key_cert_expiry(self.cert_expiry)
                .intro_enc_key_cert_expiry(self.cert_expiry)
                .lifetime(180)
                .revision_counter(42.into())
                .subcredential(None)
                .now(self.now)
        }

        fn blinded_id(&self) -> HsBlindId {
            self.blinded.public().id()
        }
    }

    /// Build an ntor-variant introduction point.
    fn ntor_intro_point(rng: &mut StdRng, link_specifiers: Vec<LinkSpec>) -> IntroPointDesc {
        let auth = ed25519::Keypair::generate(rng);
        let enc_secret = curve25519::StaticSecret::random_from_rng(&mut *rng);
        IntroPointDesc::new(
            link_specifiers,
            auth.verifying_key().into(),
            IntroEncKey::Ntor(curve25519::PublicKey::from(&enc_secret).into()),
        )
    }

    /// Build a legacy-variant introduction point bound to `svc`.
    fn legacy_intro_point(
        rng: &mut StdRng,
        svc: &TestService,
        link_specifiers: Vec<LinkSpec>,
    ) -> IntroPointDesc {
        let auth = ed25519::Keypair::generate(rng);
        let legacy_key = rsa::PrivateKey::generate(rng, 1024).unwrap();
        let crosscert = RsaCrosscert::create_and_sign(
            Ed25519Identity::new(*svc.blinded_id().as_ref()),
            svc.cert_expiry,
            &legacy_key,
            svc.now,
        )
        .unwrap();
        IntroPointDesc::new(
            link_specifiers,
            auth.verifying_key().into(),
            IntroEncKey::Legacy {
                key: legacy_key.to_public_key(),
                crosscert,
            },
        )
    }

    /// The four introduction points of the standard test descriptor.
    fn standard_intro_points(rng: &mut StdRng, svc: &TestService) -> Vec<IntroPointDesc> {
        let v4: IpAddr = "1.2.3.4".parse().unwrap();
        let v6: IpAddr = "2600::1".parse().unwrap();
        let legacy_id = rsa::RsaIdentity::from_hex(LEGACY_RELAY_ID).unwrap();
        vec![
            // A link-specifier type from the future must survive the
            // round trip byte-for-byte.
            ntor_intro_point(
                rng,
                vec![
                    LinkSpec::OrPort(v4, 9001),
                    LinkSpec::Unrecognized(77.into(), b"strange".to_vec()),
                ],
            ),
            ntor_intro_point(rng, vec![LinkSpec::OrPort(v6, 9001)]),
            ntor_intro_point(rng, vec![LinkSpec::RsaId(legacy_id)]),
            // A legacy encryption key, reachable only through a legacy
            // identity: no address at all.
            legacy_intro_point(rng, svc, vec![LinkSpec::RsaId(legacy_id)]),
        ]
    }

    #[test]
    fn round_trip() {
        let mut rng = StdRng::seed_from_u64(1);
        let svc = TestService::new(&mut rng);
        let intro_points = standard_intro_points(&mut rng, &svc);

        let encoded = svc
            .builder(&intro_points)
            .build_sign(&mut rng)
            .unwrap();
        assert!(encoded.len() <= HS_DESC_MAX_LEN);
        assert!(encoded.starts_with("hs-descriptor 3\ndescriptor-lifetime 180\n"));

        let desc =
            HsDesc::parse_decrypt_validate(&encoded, &svc.blinded_id(), None, svc.now).unwrap();

        assert_eq!(desc.lifetime_minutes(), 180);
        assert_eq!(desc.revision_counter(), 42.into());
        assert_eq!(desc.signing_cert_expires(), svc.cert_expiry);
        assert_eq!(desc.create2_formats(), &[2]);
        assert!(!desc.requires_intro_authentication());
        // Round-trip equality, in order.
        assert_eq!(desc.intro_points(), &intro_points[..]);
    }

    #[test]
    fn determinism() {
        let mut keyrng = StdRng::seed_from_u64(2);
        let svc = TestService::new(&mut keyrng);
        let intro_points = standard_intro_points(&mut keyrng, &svc);

        let encoded_1 = svc
            .builder(&intro_points)
            .build_sign(&mut StdRng::seed_from_u64(99))
            .unwrap();
        let encoded_2 = svc
            .builder(&intro_points)
            .build_sign(&mut StdRng::seed_from_u64(99))
            .unwrap();
        assert_eq!(encoded_1, encoded_2);

        // Different randomness gives a different salt, hence different
        // bytes.
        let encoded_3 = svc
            .builder(&intro_points)
            .build_sign(&mut StdRng::seed_from_u64(100))
            .unwrap();
        assert_ne!(encoded_1, encoded_3);
    }

    #[test]
    fn not_a_descriptor() {
        let blinded_id = HsBlindId::from([1; 32]);
        let err = HsDesc::parse_decrypt_validate(
            "hladfjlkjadf",
            &blinded_id,
            None,
            SystemTime::UNIX_EPOCH,
        )
        .unwrap_err();
        assert!(matches!(err, HsDescError::Malformed(_)));
    }

    #[test]
    fn unsupported_version() {
        let mut rng = StdRng::seed_from_u64(3);
        let svc = TestService::new(&mut rng);
        let encoded = svc.builder(&[]).build_sign(&mut rng).unwrap();

        let with_bad_version = encoded.replace("hs-descriptor 3", "hs-descriptor 42");
        let err = HsDesc::parse_decrypt_validate(
            &with_bad_version,
            &svc.blinded_id(),
            None,
            svc.now,
        )
        .unwrap_err();
        assert!(matches!(err, HsDescError::UnsupportedVersion(_)));
    }

    #[test]
    fn lifetime_out_of_range() {
        let mut rng = StdRng::seed_from_u64(4);
        let svc = TestService::new(&mut rng);
        let encoded = svc.builder(&[]).build_sign(&mut rng).unwrap();

        for bad in ["7181615", "721", "0"] {
            let mangled =
                encoded.replace("descriptor-lifetime 180", &format!("descriptor-lifetime {}", bad));
            let err =
                HsDesc::parse_decrypt_validate(&mangled, &svc.blinded_id(), None, svc.now)
                    .unwrap_err();
            assert!(matches!(err, HsDescError::Malformed(_)), "lifetime {}", bad);
        }
    }

    #[test]
    fn too_large() {
        let blinded_id = HsBlindId::from([1; 32]);
        let big = "x".repeat(64_000);
        let err =
            HsDesc::parse_decrypt_validate(&big, &blinded_id, None, SystemTime::UNIX_EPOCH)
                .unwrap_err();
        assert!(matches!(err, HsDescError::TooLarge));
    }

    #[test]
    fn zero_intro_points() {
        let mut rng = StdRng::seed_from_u64(5);
        let svc = TestService::new(&mut rng);
        let encoded = svc.builder(&[]).build_sign(&mut rng).unwrap();

        let desc =
            HsDesc::parse_decrypt_validate(&encoded, &svc.blinded_id(), None, svc.now).unwrap();
        assert!(desc.intro_points().is_empty());
        assert!(!desc.create2_formats().is_empty());
    }

    #[test]
    fn auth_required_round_trip() {
        let mut rng = StdRng::seed_from_u64(12);
        let svc = TestService::new(&mut rng);
        let encoded = svc
            .builder(&[])
            .auth_required(Some(smallvec::smallvec![IntroAuthType::Ed25519]))
            .build_sign(&mut rng)
            .unwrap();

        let desc =
            HsDesc::parse_decrypt_validate(&encoded, &svc.blinded_id(), None, svc.now).unwrap();
        assert!(desc.requires_intro_authentication());
        assert_eq!(desc.auth_required(), Some(&[IntroAuthType::Ed25519][..]));
    }

    #[test]
    fn version_gate() {
        assert!(is_supported_version(3));
        assert!(!is_supported_version(2));
        assert!(!is_supported_version(4));
        assert!(!is_supported_version(0));
        assert!(!is_supported_version(42));
    }

    #[test]
    fn envelope_length_validity() {
        assert!(encrypted_data_length_is_valid(16 + 32 + 10_000));
        assert!(encrypted_data_length_is_valid(16 + 32 + 20_000));
        assert!(encrypted_data_length_is_valid(16 + 32 + 50_000));
        // Too small, below one padding quantum.
        assert!(!encrypted_data_length_is_valid(0));
        assert!(!encrypted_data_length_is_valid(16 + 32));
        assert!(!encrypted_data_length_is_valid(16 + 32 + 9_999));
        // Not a multiple of the quantum.
        assert!(!encrypted_data_length_is_valid(16 + 32 + 10_001));
        // Beyond the maximum.
        assert!(!encrypted_data_length_is_valid(16 + 32 + 60_000));
    }

    #[test]
    fn cert_expiry_monotonicity() {
        let mut rng = StdRng::seed_from_u64(6);
        let svc = TestService::new(&mut rng);
        let intro_points = vec![ntor_intro_point(
            &mut rng,
            vec![LinkSpec::OrPort("1.2.3.4".parse().unwrap(), 9001)],
        )];
        let encoded = svc.builder(&intro_points).build_sign(&mut rng).unwrap();
        let expiry = svc.cert_expiry;

        let just_before = expiry - Duration::from_secs(1);
        assert!(HsDesc::parse_decrypt_validate(
            &encoded,
            &svc.blinded_id(),
            None,
            just_before
        )
        .is_ok());

        for when in [expiry, expiry + Duration::from_secs(1)] {
            let err =
                HsDesc::parse_decrypt_validate(&encoded, &svc.blinded_id(), None, when)
                    .unwrap_err();
            assert!(matches!(err, HsDescError::Expired));
        }
    }

    #[test]
    fn signature_adversarial() {
        let mut rng = StdRng::seed_from_u64(7);
        let svc = TestService::new(&mut rng);
        let encoded = svc.builder(&[]).build_sign(&mut rng).unwrap();

        // Changing a byte inside the signed range invalidates the
        // signature (while keeping the grammar intact).
        let flipped = encoded.replace("revision-counter 42", "revision-counter 43");
        assert_ne!(flipped, encoded);
        let err = HsDesc::parse_decrypt_validate(&flipped, &svc.blinded_id(), None, svc.now)
            .unwrap_err();
        assert!(matches!(err, HsDescError::BadSignature(_)));

        // Changing a character of the signature token does too.
        let sig_start = encoded.rfind("signature ").unwrap() + "signature ".len();
        let mut mangled = encoded.clone().into_bytes();
        mangled[sig_start] = if mangled[sig_start] == b'A' { b'B' } else { b'A' };
        let mangled = String::from_utf8(mangled).unwrap();
        assert_ne!(mangled, encoded);
        let err = HsDesc::parse_decrypt_validate(&mangled, &svc.blinded_id(), None, svc.now)
            .unwrap_err();
        assert!(matches!(err, HsDescError::BadSignature(_)));

        // Bytes after the signature line are a grammar violation, not a
        // signature failure.
        let trailing = format!("{}trailing-garbage 1\n", encoded);
        let err = HsDesc::parse_decrypt_validate(&trailing, &svc.blinded_id(), None, svc.now)
            .unwrap_err();
        assert!(matches!(err, HsDescError::Malformed(_)));
    }

    #[test]
    fn wrong_blinded_id() {
        let mut rng = StdRng::seed_from_u64(8);
        let svc = TestService::new(&mut rng);
        let encoded = svc.builder(&[]).build_sign(&mut rng).unwrap();

        let wrong = HsBlindId::from([12; 32]);
        let err = HsDesc::parse_decrypt_validate(&encoded, &wrong, None, svc.now).unwrap_err();
        assert!(matches!(err, HsDescError::BadCertificate(_)));
    }

    #[test]
    fn subcredential_mismatch() {
        let mut rng = StdRng::seed_from_u64(9);
        let svc = TestService::new(&mut rng);
        let subcredential: Subcredential = [21; 32].into();

        // Built with a subcredential, the descriptor only opens with it.
        let encoded = svc
            .builder(&[])
            .subcredential(Some(subcredential))
            .build_sign(&mut rng)
            .unwrap();
        assert!(HsDesc::parse_decrypt_validate(
            &encoded,
            &svc.blinded_id(),
            Some(&subcredential),
            svc.now
        )
        .is_ok());
        let err = HsDesc::parse_decrypt_validate(&encoded, &svc.blinded_id(), None, svc.now)
            .unwrap_err();
        assert!(matches!(err, HsDescError::BadEnvelope));
    }

    /// Assemble an outer document by hand around `inner_text`, so that
    /// tests can exercise inner-document contents the builder would
    /// refuse to produce.
    fn manually_wrapped_desc(svc: &TestService, inner_text: &str, rng: &mut StdRng) -> String {
        use crate::doc::hsdesc::outer::{HsOuterKwd, HS_DESC_SIGNATURE_PREFIX};
        use HsOuterKwd::*;

        let mut plaintext = inner_text.as_bytes().to_vec();
        desc_enc::pad_with_zero_to_align(&mut plaintext);
        let blinded_id = svc.blinded_id();
        let encrypted = HsDescEncryption {
            blinded_id: &blinded_id,
            subcredential: None,
            string_const: HS_DESC_ENCRYPTION_STRING_CONST,
        }
        .encrypt(rng, &plaintext);

        let cert = Ed25519Cert::constructor()
            .cert_type(CertType::HS_BLINDED_ID_V_SIGNING)
            .expiration(svc.cert_expiry)
            .signing_key(Ed25519Identity::new(*blinded_id.as_ref()))
            .cert_key(CertifiedKey::Ed25519(
                svc.hs_desc_sign.verifying_key().into(),
            ))
            .encode_and_sign(svc.blinded.as_expanded(), svc.now)
            .unwrap();

        let mut encoder = NetdocEncoder::new();
        let beginning = encoder.cursor();
        encoder.item(HS_DESCRIPTOR).arg(&3);
        encoder.item(DESCRIPTOR_LIFETIME).arg(&180);
        encoder
            .item(DESCRIPTOR_SIGNING_KEY_CERT)
            .object("ED25519 CERT", cert.as_ref());
        encoder.item(REVISION_COUNTER).arg(&42);
        encoder.item(ENCRYPTED).object("MESSAGE", encrypted);
        let end = encoder.cursor();
        let mut text = HS_DESC_SIGNATURE_PREFIX.to_vec();
        text.extend_from_slice(encoder.slice(beginning, end).unwrap().as_bytes());
        let signature = svc.hs_desc_sign.sign(&text);
        encoder
            .item(SIGNATURE)
            .arg(&Base64Unpadded::encode_string(&signature.to_bytes()));
        encoder.finish().unwrap()
    }

    #[test]
    fn unknown_enc_key_type() {
        use crate::doc::hsdesc::inner::HsInnerKwd;

        let mut rng = StdRng::seed_from_u64(10);
        let svc = TestService::new(&mut rng);

        // Build the inner document by hand, with an `enc-key` variant we
        // do not recognize.  Its auth-key certificate is valid, so the
        // parser gets as far as the variant dispatch.
        let auth = ed25519::Keypair::generate(&mut rng);
        let auth_key_cert = Ed25519Cert::constructor()
            .cert_type(CertType::HS_IP_V_SIGNING)
            .expiration(svc.cert_expiry)
            .signing_key(svc.hs_desc_sign.verifying_key().into())
            .cert_key(CertifiedKey::Ed25519(auth.verifying_key().into()))
            .encode_and_sign(&svc.hs_desc_sign, svc.now)
            .unwrap();

        let link_specifiers: Vec<u8> = {
            use oniondoc_bytes::Writer;
            let mut v = vec![];
            v.write_u8(1);
            v.write(&LinkSpec::OrPort("1.2.3.4".parse().unwrap(), 9001))
                .unwrap();
            v
        };

        let mut encoder = NetdocEncoder::new();
        {
            use HsInnerKwd::*;
            encoder.item(CREATE2_FORMATS).arg(&2);
            encoder
                .item(INTRODUCTION_POINT)
                .arg(&Base64Unpadded::encode_string(&link_specifiers));
            encoder
                .item(AUTH_KEY)
                .object("ED25519 CERT", auth_key_cert.as_ref());
            encoder
                .item(ENC_KEY)
                .arg(&"unicorn")
                .arg(&Base64Unpadded::encode_string(&[0_u8; 32]));
            encoder
                .item(ENC_KEY_CERTIFICATION)
                .object("ED25519 CERT", auth_key_cert.as_ref());
        }
        let inner_text = encoder.finish().unwrap();

        let encoded = manually_wrapped_desc(&svc, &inner_text, &mut rng);
        let err = HsDesc::parse_decrypt_validate(&encoded, &svc.blinded_id(), None, svc.now)
            .unwrap_err();
        assert!(matches!(err, HsDescError::UnknownKeyType));
    }

    #[test]
    fn bad_intro_point_condemns_descriptor() {
        let mut rng = StdRng::seed_from_u64(11);
        let svc = TestService::new(&mut rng);

        // An introduction-point record with an unknown entry inside it.
        let inner_text = "\
create2-formats 2
introduction-point AQAGAQIDBCMp
shiny-new-field 7
auth-key
-----BEGIN ED25519 CERT-----
AAEC
-----END ED25519 CERT-----
enc-key ntor AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA
enc-key-certification
-----BEGIN ED25519 CERT-----
AAEC
-----END ED25519 CERT-----
";
        let encoded = manually_wrapped_desc(&svc, inner_text, &mut rng);
        let err = HsDesc::parse_decrypt_validate(&encoded, &svc.blinded_id(), None, svc.now)
            .unwrap_err();
        assert!(matches!(err, HsDescError::BadIntroPoint(_)));
    }
}
