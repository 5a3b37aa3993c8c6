//! Parsing support for the descriptor document meta-format.
//!
//! A document is a sequence of "items", each of which is a keyword line
//! (a keyword followed by whitespace-separated arguments) optionally
//! followed by one PEM-armored binary object.  The modules here break a
//! string into items ([`tokenize`]), give each document its own keyword
//! type ([`keyword`]), and enforce per-section rules about which keywords
//! may appear, how often, and with what shape ([`parser`]).

#[macro_use]
pub(crate) mod keyword;
pub(crate) mod parser;
pub(crate) mod tokenize;
