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

pub mod pk;

use oniondoc_llcrypto::util::ct::CtByteArray;

/// A value to identify an onion service during a given period.
///
/// This is computed from the onion service's public identity and the
/// blinded identity for the current time period.
///
/// Given this piece of information, the original public identity and
/// blinded identity cannot be re-derived.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Subcredential(CtByteArray<32>);

impl AsRef<[u8; 32]> for Subcredential {
    fn as_ref(&self) -> &[u8; 32] {
        self.0.as_ref()
    }
}

impl From<[u8; 32]> for Subcredential {
    fn from(inp: [u8; 32]) -> Self {
        Subcredential(inp.into())
    }
}

impl From<Subcredential> for [u8; 32] {
    fn from(inp: Subcredential) -> [u8; 32] {
        inp.0.into()
    }
}

/// Counts which revision of an onion service descriptor is which, within a
/// given time period.
///
/// There can be gaps in this numbering.  A descriptor with a higher-valued
/// revision counter supersedes one with a lower revision counter.
#[derive(
    Copy,
    Clone,
    Debug,
    Ord,
    PartialOrd,
    Eq,
    PartialEq,
    derive_more::From,
    derive_more::Into,
    derive_more::Deref,
)]
pub struct RevisionCounter(u64);
