//! Digests and XOFs used by the descriptor codec.
//!
//! The descriptor format uses SHA-2 (for the legacy cross-certificate and
//! for Ed25519 key expansion), SHA-3 (for the envelope MAC), and SHAKE-256
//! (as the envelope KDF).  We re-export them all here in forms implementing
//! the [`digest`] traits.
//!
//! Other code should access these digests via the traits in the
//! [`digest`] crate.

pub use sha2::{Sha256, Sha512};
pub use sha3::{Sha3_256, Shake256, Shake256Reader};
