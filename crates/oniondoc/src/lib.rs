#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cognitive_complexity)]
#![warn(clippy::manual_ok_or)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::unseparated_literal_suffix)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::uninlined_format_args)]

#[macro_use]
pub(crate) mod parse;

pub mod doc;
pub(crate) mod encode;
mod err;
pub mod linkspec;
pub(crate) mod types;

pub use err::{Error, NetdocErrorKind, Pos};

/// Alias for the Result type returned by most parsing functions in this
/// crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Re-export of the error type our encoders return.
pub use oniondoc_bytes::EncodeError;
