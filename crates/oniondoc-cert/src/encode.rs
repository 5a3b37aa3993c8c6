//! Code for constructing and signing certificates.

use crate::{
    CertEncodeError, CertExt, CertType, CertifiedKey, Ed25519Cert, ExtType, SignedWithEd25519Ext,
    CREATE_SKEW_ALLOWANCE,
};
use std::time::{Duration, SystemTime};
use oniondoc_bytes::{EncodeResult, Writeable, Writer};
use oniondoc_llcrypto::pk::ed25519::{self, Ed25519PublicKey};

/// An encoded ed25519 certificate, created using
/// [`Ed25519CertConstructor::encode_and_sign`].
///
/// This certificate has already been validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedEd25519Cert(Vec<u8>);

impl AsRef<[u8]> for EncodedEd25519Cert {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<EncodedEd25519Cert> for Vec<u8> {
    fn from(c: EncodedEd25519Cert) -> Vec<u8> {
        c.0
    }
}

impl Ed25519Cert {
    /// Return a new `Ed25519CertConstructor` to create and return a new
    /// signed certificate.
    pub fn constructor() -> Ed25519CertConstructor {
        Ed25519CertConstructor::default()
    }
}

impl Writeable for CertExt {
    fn write_onto<B: Writer + ?Sized>(&self, w: &mut B) -> EncodeResult<()> {
        match self {
            CertExt::SignedWithEd25519(pk) => pk.write_onto(w),
            CertExt::Unrecognized(u) => {
                // We can't use Writer::write_nested_u8len here, since the
                // length field doesn't include the type or the flags.
                w.write_u16(
                    u.body
                        .len()
                        .try_into()
                        .map_err(|_| oniondoc_bytes::EncodeError::BadLengthValue)?,
                );
                w.write_u8(u.ext_type.into());
                let flags = u8::from(u.affects_validation);
                w.write_u8(flags);
                w.write_all(&u.body[..]);
                Ok(())
            }
        }
    }
}

impl Writeable for SignedWithEd25519Ext {
    fn write_onto<B: Writer + ?Sized>(&self, w: &mut B) -> EncodeResult<()> {
        // body length
        w.write_u16(32);
        // signed-with-ed25519-key extension type
        w.write_u8(ExtType::SIGNED_WITH_ED25519_KEY.into());
        // flags = 0.
        w.write_u8(0);
        // body
        w.write_all(self.pk.as_bytes());
        Ok(())
    }
}

/// A partially-constructed certificate, to be signed and encoded.
///
/// There is no `build()` function: we have a rule that we don't produce an
/// `Ed25519Cert` except when the certificate is known to be valid, so the
/// only way out is [`encode_and_sign`](Ed25519CertConstructor::encode_and_sign).
#[derive(Clone, Debug, Default)]
pub struct Ed25519CertConstructor {
    /// The expiration time for the certificate, in hours after the epoch.
    exp_hours: Option<u32>,
    /// The type of the certificate.
    cert_type: Option<CertType>,
    /// The key being certified.
    cert_key: Option<CertifiedKey>,
    /// The extensions to embed.
    extensions: Vec<CertExt>,
    /// The key that is alleged to sign the certificate, as declared via
    /// `signing_key`.
    signed_with: Option<ed25519::Ed25519Identity>,
}

impl Ed25519CertConstructor {
    /// Set the approximate expiration time for this certificate.
    ///
    /// (The time will be rounded forward to the nearest hour after the
    /// epoch.)
    pub fn expiration(&mut self, expiration: SystemTime) -> &mut Self {
        /// The number of seconds in an hour.
        const SEC_PER_HOUR: u64 = 3600;
        let duration = expiration
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0));
        let exp_hours = duration.as_secs().saturating_add(SEC_PER_HOUR - 1) / SEC_PER_HOUR;
        self.exp_hours = Some(exp_hours.try_into().unwrap_or(u32::MAX));
        self
    }

    /// Set the type of this certificate.
    pub fn cert_type(&mut self, t: CertType) -> &mut Self {
        self.cert_type = Some(t);
        self
    }

    /// Set the key to be certified.
    pub fn cert_key(&mut self, key: CertifiedKey) -> &mut Self {
        self.cert_key = Some(key);
        self
    }

    /// Set the signing key to be included with this certificate.
    ///
    /// This is optional: you don't need to include the signing key at all.
    /// If you do, it must match the key that you actually use to sign the
    /// certificate.
    pub fn signing_key(&mut self, key: ed25519::Ed25519Identity) -> &mut Self {
        self.clear_signing_key();
        self.signed_with = Some(key);
        self.extensions
            .push(CertExt::SignedWithEd25519(SignedWithEd25519Ext { pk: key }));
        self
    }

    /// Remove any signing key previously set on this constructor.
    pub fn clear_signing_key(&mut self) -> &mut Self {
        self.signed_with = None;
        self.extensions
            .retain(|ext| !matches!(ext, CertExt::SignedWithEd25519(_)));
        self
    }

    /// Encode a certificate into a new vector, signing the result with
    /// `skey`.
    ///
    /// The certificate's expiration must lie in the future as seen from
    /// `now` (the caller's clock); a small skew allowance of
    /// [`CREATE_SKEW_ALLOWANCE`] applies.
    pub fn encode_and_sign<S>(
        &self,
        skey: &S,
        now: SystemTime,
    ) -> Result<EncodedEd25519Cert, CertEncodeError>
    where
        S: Ed25519PublicKey + ed25519::Signer<ed25519::Signature>,
    {
        let Ed25519CertConstructor {
            exp_hours,
            cert_type,
            cert_key,
            extensions,
            signed_with,
        } = self;

        if let Some(signer) = &signed_with {
            if *signer != skey.public_key().into() {
                return Err(CertEncodeError::KeyMismatch);
            }
        }

        let exp_hours = exp_hours.ok_or(CertEncodeError::MissingField("expiration"))?;
        let expiry = SystemTime::UNIX_EPOCH + Duration::from_secs(u64::from(exp_hours) * 3600);
        if expiry + CREATE_SKEW_ALLOWANCE <= now {
            return Err(CertEncodeError::ExpiredAtCreation);
        }

        let mut w = Vec::new();
        w.write_u8(1); // Version
        w.write_u8(
            cert_type
                .ok_or(CertEncodeError::MissingField("cert_type"))?
                .into(),
        );
        w.write_u32(exp_hours);
        let cert_key = cert_key
            .clone()
            .ok_or(CertEncodeError::MissingField("cert_key"))?;
        w.write_u8(cert_key.key_type().into());
        w.write_all(cert_key.as_bytes());
        w.write_u8(
            extensions
                .len()
                .try_into()
                .map_err(|_| CertEncodeError::TooManyExtensions)?,
        );

        for e in extensions.iter() {
            e.write_onto(&mut w)?;
        }

        let signature = skey
            .try_sign(&w[..])
            .map_err(|_| CertEncodeError::SignatureFailed)?;
        w.write(&signature)?;
        Ok(EncodedEd25519Cert(w))
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::CertifiedKey;
    use std::time::{Duration, SystemTime};

    #[test]
    fn signed_cert_round_trip() {
        let mut rng = rand::rngs::OsRng;
        let keypair = ed25519::Keypair::generate(&mut rng);
        let now = SystemTime::now();
        let day = Duration::from_secs(86400);
        let encoded = Ed25519Cert::constructor()
            .expiration(now + day * 30)
            .cert_key(CertifiedKey::Ed25519(keypair.verifying_key().into()))
            .cert_type(CertType::HS_IP_V_SIGNING)
            .signing_key(keypair.verifying_key().into())
            .encode_and_sign(&keypair, now)
            .unwrap();

        let decoded = Ed25519Cert::decode(encoded.as_ref()).unwrap(); // Well-formed?
        assert_eq!(decoded.peek_cert_type(), CertType::HS_IP_V_SIGNING);
        let validated = decoded
            .should_have_signing_key()
            .unwrap()
            .check_signature()
            .unwrap(); // Well-signed?
        let cert = validated.check_valid_at(&(now + day * 20)).unwrap();
        assert_eq!(cert.cert_type(), CertType::HS_IP_V_SIGNING);
        if let CertifiedKey::Ed25519(found) = cert.subject_key() {
            assert_eq!(found, &keypair.verifying_key().into());
        } else {
            panic!("wrong key type");
        }
        assert!(cert.signing_key() == Some(&keypair.verifying_key().into()));
    }

    #[test]
    fn expired_cert_rejected() {
        let mut rng = rand::rngs::OsRng;
        let keypair = ed25519::Keypair::generate(&mut rng);
        let now = SystemTime::now();
        let day = Duration::from_secs(86400);
        let encoded = Ed25519Cert::constructor()
            .expiration(now + day)
            .cert_key(CertifiedKey::Ed25519(keypair.verifying_key().into()))
            .cert_type(CertType::HS_IP_V_SIGNING)
            .signing_key(keypair.verifying_key().into())
            .encode_and_sign(&keypair, now)
            .unwrap();

        let checked = Ed25519Cert::decode(encoded.as_ref())
            .unwrap()
            .should_have_signing_key()
            .unwrap()
            .check_signature()
            .unwrap();
        assert_eq!(
            checked.check_valid_at(&(now + day * 2)).err(),
            Some(crate::CertError::Expired)
        );
    }

    #[test]
    fn cannot_issue_already_expired() {
        let mut rng = rand::rngs::OsRng;
        let keypair = ed25519::Keypair::generate(&mut rng);
        let now = SystemTime::now();
        let hour = Duration::from_secs(3600);
        let err = Ed25519Cert::constructor()
            .expiration(now - hour * 2)
            .cert_key(CertifiedKey::Ed25519(keypair.verifying_key().into()))
            .cert_type(CertType::HS_IP_V_SIGNING)
            .signing_key(keypair.verifying_key().into())
            .encode_and_sign(&keypair, now)
            .unwrap_err();
        assert!(matches!(err, CertEncodeError::ExpiredAtCreation));
    }

    #[test]
    fn mismatched_signing_key_rejected() {
        let mut rng = rand::rngs::OsRng;
        let keypair = ed25519::Keypair::generate(&mut rng);
        let other = ed25519::Keypair::generate(&mut rng);
        let now = SystemTime::now();
        let day = Duration::from_secs(86400);
        let err = Ed25519Cert::constructor()
            .expiration(now + day)
            .cert_key(CertifiedKey::Ed25519(keypair.verifying_key().into()))
            .cert_type(CertType::HS_IP_V_SIGNING)
            .signing_key(other.verifying_key().into())
            .encode_and_sign(&keypair, now)
            .unwrap_err();
        assert!(matches!(err, CertEncodeError::KeyMismatch));
    }
}
