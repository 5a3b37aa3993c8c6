//! Re-exporting RSA implementations.
//!
//! Legacy introduction-point encryption keys are RSA-1024; this module
//! handles encoding and decoding those keys from PKCS#1 DER, verifying the
//! PKCS#1-v1.5 signatures they make (with the hash algorithm OID omitted),
//! and producing such signatures for cross-certificates.

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPublicKey};
use std::fmt;
use subtle::{Choice, ConstantTimeEq};

use crate::util::ct::CtByteArray;

/// How many bytes are in an "RSA ID"?  (This is a legacy concept: a relay
/// identified by a SHA1 digest of its DER-encoded RSA public key.)
pub const RSA_ID_LEN: usize = 20;

/// An identifier for an RSA key, based on SHA1 and DER.
///
/// This object is an "identity" in the sense that it identifies (up to) one
/// RSA key.  It may also represent the identity for a particular entity,
/// such as a relay.
#[derive(Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq)]
pub struct RsaIdentity {
    /// SHA1 digest of a DER encoded public key.
    id: CtByteArray<RSA_ID_LEN>,
}

impl ConstantTimeEq for RsaIdentity {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.id.ct_eq(&other.id)
    }
}

impl fmt::Display for RsaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", hex::encode(&self.id.as_ref()[..]))
    }
}
impl fmt::Debug for RsaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RsaIdentity {{ {} }}", self)
    }
}

impl RsaIdentity {
    /// Expose an RsaIdentity as a slice of bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.id.as_ref()[..]
    }
    /// Construct an RsaIdentity from a slice of bytes.
    ///
    /// Returns None if the input is not of the correct length.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(RsaIdentity {
            id: CtByteArray::from(<[u8; RSA_ID_LEN]>::try_from(bytes).ok()?),
        })
    }
    /// Decode an `RsaIdentity` from a hexadecimal string.
    ///
    /// The string must have no spaces, or any extra characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut array = [0_u8; 20];
        match hex::decode_to_slice(s, &mut array) {
            Err(_) => None,
            Ok(()) => Some(RsaIdentity::from(array)),
        }
    }
}

impl From<[u8; 20]> for RsaIdentity {
    fn from(id: [u8; 20]) -> RsaIdentity {
        RsaIdentity { id: id.into() }
    }
}

/// An RSA public key.
///
/// This implementation is a simple wrapper so that we can define new
/// methods and traits on the type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(rsa::RsaPublicKey);

/// An RSA private key.
///
/// Used by a service that still holds a legacy introduction-point key, to
/// sign the cross-certificate binding that key to its blinded identity.
pub struct PrivateKey(rsa::RsaPrivateKey);

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(...)")
    }
}

impl PrivateKey {
    /// Return the public component of this key.
    pub fn to_public_key(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }
    /// Construct a PrivateKey from DER pkcs1 encoding.
    pub fn from_der(der: &[u8]) -> Option<Self> {
        Some(PrivateKey(rsa::RsaPrivateKey::from_pkcs1_der(der).ok()?))
    }
    /// Generate a new RSA private key with a modulus of `bits` bits.
    pub fn generate<R>(rng: &mut R, bits: usize) -> Option<Self>
    where
        R: rand_core::RngCore + rand_core::CryptoRng,
    {
        Some(PrivateKey(rsa::RsaPrivateKey::new(rng, bits).ok()?))
    }
    /// Sign a previously computed digest with this key, using PKCS#1-v1.5
    /// padding with the hash algorithm OID omitted.
    pub fn sign(&self, hashed: &[u8]) -> Result<Vec<u8>, signature::Error> {
        let padding = rsa::pkcs1v15::Pkcs1v15Sign::new_unprefixed();
        self.0
            .sign(padding, hashed)
            .map_err(|_| signature::Error::new())
    }
}

impl PublicKey {
    /// Return true iff the exponent for this key is the same number as 'e'.
    pub fn exponent_is(&self, e: u32) -> bool {
        use rsa::traits::PublicKeyParts;
        *self.0.e() == rsa::BigUint::new(vec![e])
    }
    /// Return the number of bits in the modulus for this key.
    pub fn bits(&self) -> usize {
        use rsa::traits::PublicKeyParts;
        self.0.n().bits()
    }
    /// Try to check a signature.  The signed hash should be in 'hashed',
    /// and the alleged signature in 'sig'.
    ///
    /// These are RSA-PKCSv1 signatures, with hash algorithm OIDs omitted.
    pub fn verify(&self, hashed: &[u8], sig: &[u8]) -> Result<(), signature::Error> {
        let padding = rsa::pkcs1v15::Pkcs1v15Sign::new_unprefixed();
        self.0
            .verify(padding, hashed, sig)
            .map_err(|_| signature::Error::new())
    }
    /// Decode an alleged DER byte string into a PublicKey.
    ///
    /// Return None if the DER string does not have a valid PublicKey.
    ///
    /// (This function expects an RSAPublicKey structure, not a
    /// SubjectPublicKeyInfo.)
    pub fn from_der(der: &[u8]) -> Option<Self> {
        Some(PublicKey(rsa::RsaPublicKey::from_pkcs1_der(der).ok()?))
    }
    /// Encode this public key into DER format.
    ///
    /// The result is an RSAPublicKey structure, not a SubjectPublicKeyInfo.
    pub fn to_der(&self) -> Vec<u8> {
        self.0
            .to_pkcs1_der()
            .expect("RSA key not encodable as DER")
            .as_bytes()
            .to_vec()
    }
}

/// An RSA signature plus all the information needed to validate it.
pub struct ValidatableRsaSignature {
    /// The key that allegedly signed this signature
    key: PublicKey,
    /// The signature in question
    sig: Vec<u8>,
    /// The value we expect to find that the signature is a signature of.
    expected_hash: Vec<u8>,
}

impl ValidatableRsaSignature {
    /// Construct a new ValidatableRsaSignature.
    pub fn new(key: &PublicKey, sig: &[u8], expected_hash: &[u8]) -> Self {
        ValidatableRsaSignature {
            key: key.clone(),
            sig: sig.into(),
            expected_hash: expected_hash.into(),
        }
    }
}

impl super::ValidatableSignature for ValidatableRsaSignature {
    fn is_valid(&self) -> bool {
        self.key
            .verify(&self.expected_hash[..], &self.sig[..])
            .is_ok()
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn rsa_identity_basics() {
        let bytes = b"xyzzyxyzzyxyzzyxyzzy";
        let id = RsaIdentity::from_bytes(&bytes[..]).unwrap();
        assert_eq!(id.as_bytes(), &bytes[..]);
        assert_eq!(RsaIdentity::from_bytes(&bytes[..5]), None);

        let hex = "0299F268FCA9D55CD157976D39AE92B4B455B3A8";
        let id = RsaIdentity::from_hex(hex).unwrap();
        assert_eq!(hex::encode(id.as_bytes()), hex.to_lowercase());
    }

    #[test]
    fn der_round_trip_and_sign() {
        let mut rng = rand::rngs::OsRng;
        let sk = PrivateKey::generate(&mut rng, 1024).unwrap();
        let pk = sk.to_public_key();
        assert!(pk.exponent_is(65537));
        assert_eq!(pk.bits(), 1024);

        let der = pk.to_der();
        let pk2 = PublicKey::from_der(&der).unwrap();
        assert_eq!(pk, pk2);

        use digest::Digest;
        let digest = crate::d::Sha256::digest(b"a digest to sign");
        let sig = sk.sign(&digest).unwrap();
        assert!(pk.verify(&digest, &sig).is_ok());
        assert!(pk.verify(&digest, &sig[1..]).is_err());
    }
}
