//! RSA cross-certificates for legacy introduction-point keys.
//!
//! A service that still uses a legacy (RSA) introduction-point encryption
//! key proves that the key consents to being bound under the service's
//! blinded identity by signing a small cross-certificate with it.  The
//! verification path mirrors the Ed25519 certificates, but with the legacy
//! primitive.

use oniondoc_bytes::{Reader, Writer};
use oniondoc_llcrypto as ll;

use digest::Digest;

use crate::{CertEncodeError, CertError, CREATE_SKEW_ALLOWANCE};
use std::time::{Duration, SystemTime};

/// A cross-certificate binding a legacy RSA key to a blinded identity.
///
/// The RSA key is the signer; the blinded identity is the subject.  (There
/// is no converse form: the legacy keys are too weak to be certified by.)
#[must_use]
pub struct RsaCrosscert {
    /// The blinded identity that is being certified.
    subject_key: ll::pk::ed25519::Ed25519Identity,
    /// The expiration time of this certificate, in hours since the
    /// unix epoch.
    exp_hours: u32,
    /// The digest of the signed part of the certificate (for checking).
    digest: [u8; 32],
    /// The (alleged) signature on the certificate.
    signature: Vec<u8>,
}

/// Number of seconds in an hour.
const SECS_PER_HOUR: u64 = 3600;

/// Prefix used when computing the digest of an RsaCrosscert.
const PREFIX: &[u8] = b"Tor TLS RSA/Ed25519 cross-certificate";

/// Compute the SHA256 digest of `c`, prefixed with PREFIX.
fn compute_digest(c: &[u8]) -> [u8; 32] {
    let mut d = ll::d::Sha256::new();
    d.update(PREFIX);
    d.update(c);
    d.finalize().into()
}

impl RsaCrosscert {
    /// Return the time at which this certificate becomes expired.
    pub fn expiry(&self) -> SystemTime {
        let d = Duration::new(u64::from(self.exp_hours) * SECS_PER_HOUR, 0);
        SystemTime::UNIX_EPOCH + d
    }

    /// Return true iff this certificate will be expired at the time `when`.
    pub fn is_expired_at(&self, when: SystemTime) -> bool {
        when >= self.expiry()
    }

    /// Return true if the subject key in this certificate matches `other`.
    pub fn subject_key_matches(&self, other: &ll::pk::ed25519::Ed25519Identity) -> bool {
        other == &self.subject_key
    }

    /// Decode a slice of bytes into an RSA crosscert.
    pub fn decode(bytes: &[u8]) -> oniondoc_bytes::Result<UncheckedRsaCrosscert> {
        let mut r = Reader::from_slice(bytes);
        let signed_portion = r.peek(36)?;
        let subject_key = r.extract()?;
        let exp_hours = r.take_u32()?;
        let siglen = r.take_u8()?;
        let signature = r.take(siglen as usize)?.into();
        r.should_be_exhausted()?;

        let digest = compute_digest(signed_portion);

        let cc = RsaCrosscert {
            subject_key,
            exp_hours,
            digest,
            signature,
        };

        Ok(UncheckedRsaCrosscert(cc))
    }

    /// Construct and sign a new cross-certificate binding
    /// `subject_blinded_id` with the legacy key `skey`, expiring at
    /// `expiration`.
    ///
    /// As with the Ed25519 certificates, the expiration is rounded forward
    /// to a whole hour, and must not already be past as seen from `now`
    /// (modulo the creation skew allowance).
    pub fn create_and_sign(
        subject_blinded_id: ll::pk::ed25519::Ed25519Identity,
        expiration: SystemTime,
        skey: &ll::pk::rsa::PrivateKey,
        now: SystemTime,
    ) -> Result<EncodedRsaCrosscert, CertEncodeError> {
        let duration = expiration
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0));
        let exp_hours: u32 = (duration.as_secs().saturating_add(SECS_PER_HOUR - 1)
            / SECS_PER_HOUR)
            .try_into()
            .unwrap_or(u32::MAX);
        let expiry = SystemTime::UNIX_EPOCH + Duration::from_secs(u64::from(exp_hours) * 3600);
        if expiry + CREATE_SKEW_ALLOWANCE <= now {
            return Err(CertEncodeError::ExpiredAtCreation);
        }

        let mut w = Vec::new();
        w.write(&subject_blinded_id)?;
        w.write_u32(exp_hours);

        let digest = compute_digest(&w[..]);
        let signature = skey
            .sign(&digest[..])
            .map_err(|_| CertEncodeError::SignatureFailed)?;

        let siglen: u8 = signature
            .len()
            .try_into()
            .map_err(|_| oniondoc_bytes::EncodeError::BadLengthValue)
            .map_err(CertEncodeError::from)?;
        w.write_u8(siglen);
        w.write_all(&signature[..]);

        Ok(EncodedRsaCrosscert(w))
    }
}

/// An RsaCrosscert whose signature has not been checked.
pub struct UncheckedRsaCrosscert(RsaCrosscert);

impl UncheckedRsaCrosscert {
    /// Check the signature on this certificate with the provided legacy
    /// key.
    pub fn check_signature(
        self,
        k: &ll::pk::rsa::PublicKey,
    ) -> Result<RsaCrosscert, CertError> {
        k.verify(&self.0.digest[..], &self.0.signature[..])
            .map_err(|_| CertError::BadSignature)?;
        Ok(self.0)
    }
}

/// An encoded cross-certificate, as produced by
/// [`RsaCrosscert::create_and_sign`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedRsaCrosscert(Vec<u8>);

impl AsRef<[u8]> for EncodedRsaCrosscert {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<EncodedRsaCrosscert> for Vec<u8> {
    fn from(c: EncodedRsaCrosscert) -> Vec<u8> {
        c.0
    }
}

impl From<Vec<u8>> for EncodedRsaCrosscert {
    fn from(bytes: Vec<u8>) -> EncodedRsaCrosscert {
        EncodedRsaCrosscert(bytes)
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::time::Duration;

    #[test]
    fn sign_and_verify() {
        let mut rng = rand::rngs::OsRng;
        let skey = ll::pk::rsa::PrivateKey::generate(&mut rng, 1024).unwrap();
        let subject = ll::pk::ed25519::Ed25519Identity::new([17; 32]);
        let now = SystemTime::now();
        let expiration = now + Duration::from_secs(3600 * 54);

        let encoded = RsaCrosscert::create_and_sign(subject, expiration, &skey, now).unwrap();

        let cc = RsaCrosscert::decode(encoded.as_ref())
            .unwrap()
            .check_signature(&skey.to_public_key())
            .unwrap();
        assert!(cc.subject_key_matches(&subject));
        assert!(!cc.subject_key_matches(&ll::pk::ed25519::Ed25519Identity::new([18; 32])));
        assert!(!cc.is_expired_at(now));
        assert!(cc.is_expired_at(now + Duration::from_secs(3600 * 55)));

        // A wrong key must not verify it.
        let other = ll::pk::rsa::PrivateKey::generate(&mut rng, 1024).unwrap();
        assert!(RsaCrosscert::decode(encoded.as_ref())
            .unwrap()
            .check_signature(&other.to_public_key())
            .is_err());

        // Neither must a tampered certificate.
        let mut mangled: Vec<u8> = encoded.clone().into();
        mangled[1] ^= 0x40;
        assert!(RsaCrosscert::decode(&mangled)
            .unwrap()
            .check_signature(&skey.to_public_key())
            .is_err());
    }

    #[test]
    fn cannot_issue_already_expired() {
        let mut rng = rand::rngs::OsRng;
        let skey = ll::pk::rsa::PrivateKey::generate(&mut rng, 1024).unwrap();
        let subject = ll::pk::ed25519::Ed25519Identity::new([17; 32]);
        let now = SystemTime::now();
        let err =
            RsaCrosscert::create_and_sign(subject, now - Duration::from_secs(7200), &skey, now)
                .unwrap_err();
        assert!(matches!(err, CertEncodeError::ExpiredAtCreation));
    }
}
