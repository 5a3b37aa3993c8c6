//! Ciphers used by the descriptor codec.
//!
//! The encrypted section of a descriptor uses exactly one cipher: AES in
//! counter mode.

/// Re-exports implementations of counter-mode AES.
///
/// These ciphers implement the `cipher::StreamCipher` trait, so use
/// the [`cipher`](https://docs.rs/cipher) crate to access them.
pub mod aes {
    /// AES256 in counter mode, as used for the descriptor envelope.
    pub type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;
}
