//! Internal: Declare an Error type for oniondoc-bytes.

use std::borrow::Cow;
use thiserror::Error;

/// Error type for decoding objects from bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Tried to read something, but we didn't find enough bytes.
    ///
    /// This can mean that the object is truncated, or that we need to
    /// read more and try again.
    #[error("Object truncated (or not fully present)")]
    Truncated,
    /// Called Reader::should_be_exhausted(), but found bytes anyway.
    #[error("Extra bytes at end of object")]
    ExtraneousBytes,
    /// Invalid length value.
    #[error("Object length too large to represent as usize")]
    BadLengthValue,
    /// An attempt to parse an object failed for some reason related to its
    /// contents.
    #[error("Bad object: {0}")]
    InvalidMessage(Cow<'static, str>),
}

/// Error type for encoding objects to bytes.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum EncodeError {
    /// We tried to encode an object with an attached length, but the length
    /// was too large to encode in the available space.
    #[error("Object length too large to encode")]
    BadLengthValue,
    /// The caller provided a value that cannot be encoded in this format.
    #[error("Tried to encode an unrepresentable value: {0}")]
    BadApiUsage(Cow<'static, str>),
}

impl EncodeError {
    /// Construct a `BadApiUsage` error with the provided message.
    pub fn bad_api_usage<T>(msg: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        EncodeError::BadApiUsage(msg.into())
    }
}
