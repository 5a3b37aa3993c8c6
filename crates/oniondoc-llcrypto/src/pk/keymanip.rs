//! Key manipulation functions for use with public keys.
//!
//! Two operations live here: converting a Curve25519 public key into the
//! Ed25519 public key with the same scalar (needed when an encryption key
//! must appear as the subject of an Ed25519 certificate), and deriving the
//! "blinded" per-period identity keys under which descriptors are signed.

use crate::pk;
use thiserror::Error;

use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::montgomery::MontgomeryPoint;
use curve25519_dalek::scalar::Scalar;
use digest::Digest;

/// Convert a curve25519 public key (with sign bit) to an ed25519 public
/// key, for use in signature checking.
///
/// Note that this function is not a validating conversion: it does not
/// check whether the provided key is a valid ed25519 key for any purpose.
pub fn convert_curve25519_to_ed25519_public(
    pubkey: &pk::curve25519::PublicKey,
    signbit: u8,
) -> Option<pk::ed25519::PublicKey> {
    let point = MontgomeryPoint(*pubkey.as_bytes());

    // TODO: This is a costly function that ends up computing an inverse.
    // We could at least avoid a compression/decompression round-trip.
    let edpoint = point.to_edwards(signbit)?;
    let compressed_y = edpoint.compress();

    pk::ed25519::PublicKey::from_bytes(compressed_y.as_bytes()).ok()
}

/// An error that occurs while trying to derive a blinded key.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum BlindingError {
    /// A provided public key was not valid.
    #[error("Public key was invalid")]
    BadPubkey,
}

/// Clamp a blinding factor the way the Ed25519 secret scalar is clamped.
///
/// This takes the high and low bits into the form every derived scalar has,
/// so that the blinded scalar stays in the correct subgroup.
fn clamp_blinding_factor(h: &mut [u8; 32]) {
    h[0] &= 248;
    h[31] &= 63;
    h[31] |= 64;
}

/// Derive the public key for a blinded identity, given its unblinded public
/// key and a blinding parameter `h`.
pub fn blind_pubkey(
    pk: &pk::ed25519::PublicKey,
    mut h: [u8; 32],
) -> Result<pk::ed25519::PublicKey, BlindingError> {
    clamp_blinding_factor(&mut h);
    let blinding_factor = Scalar::from_bytes_mod_order(h);

    let pubkey_point = CompressedEdwardsY(pk.to_bytes())
        .decompress()
        .ok_or(BlindingError::BadPubkey)?;
    let blinded_pubkey_point = (blinding_factor * pubkey_point).compress();

    pk::ed25519::PublicKey::from_bytes(&blinded_pubkey_point.0).map_err(|_| BlindingError::BadPubkey)
}

/// Derive a blinded signing keypair from an expanded identity keypair and a
/// blinding parameter `h`.
///
/// The returned keypair can sign under the blinded identity returned by
/// [`blind_pubkey`] for the same `h`.
pub fn blind_keypair(
    keypair: &pk::ed25519::ExpandedKeypair,
    mut h: [u8; 32],
) -> Result<pk::ed25519::ExpandedKeypair, BlindingError> {
    /// Fixed string used when deriving the hash prefix of a blinded key.
    const RH_BLIND_STRING: &[u8] = b"Derive temporary signing key hash input";

    clamp_blinding_factor(&mut h);
    let blinding_factor = Scalar::from_bytes_mod_order(h);

    let blinded_scalar = keypair.secret.scalar * blinding_factor;
    let blinded_hash_prefix: [u8; 32] = {
        let mut d = crate::d::Sha512::new();
        d.update(RH_BLIND_STRING);
        d.update(keypair.secret.hash_prefix);
        let mut prefix = [0_u8; 32];
        prefix.copy_from_slice(&d.finalize()[0..32]);
        prefix
    };

    let mut bytes = [0_u8; 64];
    bytes[0..32].copy_from_slice(&blinded_scalar.to_bytes());
    bytes[32..64].copy_from_slice(&blinded_hash_prefix);
    pk::ed25519::ExpandedKeypair::from_secret_key_bytes(bytes).ok_or(BlindingError::BadPubkey)
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::pk::ed25519::{Ed25519Identity, ExpandedKeypair, Keypair, Verifier as _};

    #[test]
    fn curve_to_ed_conversion() {
        let mut rng = rand::rngs::OsRng;
        let secret = pk::curve25519::StaticSecret::random_from_rng(&mut rng);
        let public = pk::curve25519::PublicKey::from(&secret);

        let ed0 = convert_curve25519_to_ed25519_public(&public, 0).unwrap();
        let ed1 = convert_curve25519_to_ed25519_public(&public, 1).unwrap();

        // Same point, opposite signs.
        assert_ne!(ed0.to_bytes(), ed1.to_bytes());
        assert_eq!(ed0.to_bytes()[..31], ed1.to_bytes()[..31]);
    }

    #[test]
    fn blinded_keys_match() {
        let mut rng = rand::rngs::OsRng;
        let id = Keypair::generate(&mut rng);
        let expanded = ExpandedKeypair::from(&id);
        let param = [42_u8; 32];

        let blinded_pk = blind_pubkey(&id.verifying_key(), param).unwrap();
        let blinded_kp = blind_keypair(&expanded, param).unwrap();

        // The independently blinded public key matches the keypair's, and
        // signatures made with the blinded keypair verify under it.
        assert_eq!(
            Ed25519Identity::from(&blinded_pk),
            Ed25519Identity::from(blinded_kp.public())
        );
        let msg = b"9000 years of history";
        let sig = blinded_kp.sign(msg);
        assert!(blinded_pk.verify(msg, &sig).is_ok());

        // A different parameter gives a different identity.
        let other = blind_pubkey(&id.verifying_key(), [43_u8; 32]).unwrap();
        assert_ne!(
            Ed25519Identity::from(&other),
            Ed25519Identity::from(&blinded_pk)
        );
    }
}
