//! Define error types for the oniondoc-cert crate.

use thiserror::Error;

/// An error related to checking or validating a certificate.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum CertError {
    /// The certificate was expected to contain its signing key, but it
    /// didn't.
    #[error("Certificate was not self-contained")]
    MissingPubKey,
    /// The certificate's signing key was not as expected.
    #[error("Certificate signing key mismatch")]
    KeyMismatch,
    /// The signature on the certificate was invalid.
    #[error("Invalid certificate signature")]
    BadSignature,
    /// The certificate is expired.
    #[error("Certificate is expired")]
    Expired,
}

/// An error that can occur when building or signing a certificate.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum CertEncodeError {
    /// A required field was not provided.
    #[error("Missing field {0:?}")]
    MissingField(&'static str),
    /// The provided signing key does not match the declared one.
    #[error("Signing key does not match signed-with-ed25519-key extension")]
    KeyMismatch,
    /// A certificate may have at most 255 extensions.
    #[error("Too many extensions")]
    TooManyExtensions,
    /// The requested expiration time is already in the past.
    ///
    /// (A small clock-skew allowance applies when creating certificates;
    /// this error means the expiry was past even with that allowance.)
    #[error("Certificate expiration is already past")]
    ExpiredAtCreation,
    /// The signing operation itself failed.
    #[error("Could not produce the certificate signature")]
    SignatureFailed,
    /// A value did not fit into its encoded representation.
    #[error("Value could not be encoded")]
    Encoding(#[from] oniondoc_bytes::EncodeError),
}
