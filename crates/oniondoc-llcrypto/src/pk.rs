//! Public-key cryptography for the descriptor codec.
//!
//! Descriptors are signed with Ed25519; introduction-point encryption keys
//! are Curve25519; legacy encryption keys are RSA-1024.

pub mod ed25519;
pub mod keymanip;
pub mod rsa;

/// Re-exporting Curve25519 implementations.
///
/// We re-use the APIs from [`x25519_dalek`] directly.
pub mod curve25519 {
    pub use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};
}

/// Type for a validatable signature.
///
/// It necessarily includes the signature, the public key, and (a hash of?)
/// the document being checked.
///
/// Having this trait enables us to write code for checking a large number
/// of validatable signatures in a way that permits batch signatures for
/// Ed25519.
pub trait ValidatableSignature {
    /// Check whether this signature is a correct signature for the document.
    fn is_valid(&self) -> bool;

    /// Return this value as a validatable Ed25519 signature, if it is one.
    fn as_ed25519(&self) -> Option<&ed25519::ValidatableEd25519Signature> {
        None
    }
}

/// Check whether all of the signatures in this slice are valid.
///
/// Having a separate implementation here enables us to use batch
/// verification for Ed25519 signatures.
pub fn validate_all_sigs(sigs: &[Box<dyn ValidatableSignature>]) -> bool {
    let ed_sigs: Vec<_> = sigs.iter().filter_map(|s| s.as_ed25519()).collect();
    let others = sigs.iter().filter(|s| s.as_ed25519().is_none());

    ed25519::validate_batch(&ed_sigs[..]) && others.fold(true, |okay, s| okay & s.is_valid())
}
