//! Support for encoding the descriptor document meta-format.
//!
//! This facility produces output that complies with the meta-document
//! format: keyword lines with space-separated arguments, optionally
//! followed by a PEM-armored object.
//!
//! However, no checks are done on keyword presence/absence, multiplicity,
//! or ordering, so the output may not necessarily conform to the format of
//! the particular intended document.  It is the caller's responsibility to
//! call `.item()` in the right order, with the right keywords and
//! arguments.

use std::fmt::{Display, Write};

use base64ct::{Base64, Encoding};

use crate::parse::keyword::Keyword;
use crate::parse::tokenize::{object, tag_keywords_ok};
use oniondoc_bytes::EncodeError;

/// Encoder, representing a partially-built document.
///
/// For example usage, see the tests in this module, or the descriptor
/// building code in `doc::hsdesc::build`.
#[derive(Debug, Clone)]
pub(crate) struct NetdocEncoder {
    /// The being-built document, with everything accumulated so far.
    ///
    /// If an [`ItemEncoder`] exists, it will add a newline when it's
    /// dropped.
    ///
    /// `Err` means bad values were passed to some builder function.
    /// Such errors are accumulated here so that document-building code
    /// does not need error handling at every step.
    built: Result<String, EncodeError>,
}

/// Encoder for an individual item within a being-built document.
///
/// Returned by [`NetdocEncoder::item()`].
#[derive(Debug)]
pub(crate) struct ItemEncoder<'n> {
    /// The document including the partial item that we're building.
    ///
    /// We will always add a newline when we're dropped.
    doc: &'n mut NetdocEncoder,
}

/// Position within a (perhaps partially-) built document.
///
/// This is provided mainly to allow the caller to perform signature
/// operations on the part of the document that is to be signed.
/// (Sometimes this is only part of it.)
///
/// There is no enforced linkage between this and the document it refers
/// to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) struct Cursor {
    /// The offset (in bytes, as for `&str`).
    ///
    /// Can be out of range if the corresponding `NetdocEncoder` contains
    /// an `Err`.
    offset: usize,
}

impl NetdocEncoder {
    /// Start encoding a document.
    pub(crate) fn new() -> Self {
        NetdocEncoder {
            built: Ok(String::new()),
        }
    }

    /// Adds an item to the being-built document.
    ///
    /// The item can be further extended with arguments or an object,
    /// using the returned `ItemEncoder`.
    pub(crate) fn item<K: Keyword>(&mut self, keyword: K) -> ItemEncoder<'_> {
        self.raw(&keyword.to_str());
        ItemEncoder { doc: self }
    }

    /// Internal name for `push_raw_string()`.
    fn raw(&mut self, s: &dyn Display) {
        self.write_with(|b| {
            write!(b, "{}", s).expect("write! failed on String");
            Ok(())
        });
    }

    /// Extend the being-built document with a fallible function `f`.
    ///
    /// Doesn't call `f` if the building has already failed, and handles
    /// the error if `f` fails.
    fn write_with(&mut self, f: impl FnOnce(&mut String) -> Result<(), EncodeError>) {
        let Ok(build) = &mut self.built else {
            return;
        };
        match f(build) {
            Ok(()) => (),
            Err(e) => {
                self.built = Err(e);
            }
        }
    }

    /// Return a cursor, pointing to just after the last item (if any).
    pub(crate) fn cursor(&self) -> Cursor {
        let offset = match &self.built {
            Ok(b) => b.len(),
            Err(_) => usize::MAX,
        };
        Cursor { offset }
    }

    /// Obtain the text of a section of the document.
    ///
    /// Useful for making a signature.
    pub(crate) fn slice(&self, begin: Cursor, end: Cursor) -> Result<&str, EncodeError> {
        self.built
            .as_ref()
            .map_err(Clone::clone)?
            .get(begin.offset..end.offset)
            .ok_or_else(|| EncodeError::bad_api_usage("slice out of bounds, Cursor mismanaged"))
    }

    /// Build the document into textual form.
    pub(crate) fn finish(self) -> Result<String, EncodeError> {
        self.built
    }
}

impl<'n> ItemEncoder<'n> {
    /// Add a single argument.
    ///
    /// If the argument is not in the correct syntax, an error is recorded
    /// in the document builder (and reported by `finish`).
    pub(crate) fn arg(self, arg: &dyn Display) -> Self {
        self.doc.write_with(|b| {
            let arg = arg.to_string();
            if arg.is_empty() || arg.chars().any(|c| !c.is_ascii_graphic()) {
                return Err(EncodeError::bad_api_usage(format!(
                    "invalid keyword line argument syntax {:?}",
                    arg
                )));
            }
            write!(b, " {}", arg).expect("write! failed on String");
            Ok(())
        });
        self
    }

    /// Add a base64-encoded object with the provided tag.
    ///
    /// If the tag is not in the correct syntax, an error is recorded in
    /// the document builder (and reported by `finish`).
    pub(crate) fn object(self, tag: &str, data: impl AsRef<[u8]>) {
        let data = data.as_ref();
        self.doc.write_with(|b| {
            if !tag_keywords_ok(tag) {
                return Err(EncodeError::bad_api_usage(format!(
                    "invalid object tag {:?}",
                    tag
                )));
            }
            let encoded = Base64::encode_string(data);
            write!(b, "\n{}{}{}", object::BEGIN_STR, tag, object::TAG_END)
                .expect("write! failed on String");
            for chunk in encoded.as_bytes().chunks(object::BASE64_PEM_MAX_LINE) {
                let chunk = std::str::from_utf8(chunk).expect("base64 was not utf-8?");
                write!(b, "\n{}", chunk).expect("write! failed on String");
            }
            write!(b, "\n{}{}{}", object::END_STR, tag, object::TAG_END)
                .expect("write! failed on String");
            Ok(())
        });
        // (When we are dropped, the final newline gets added.)
    }
}

impl<'n> Drop for ItemEncoder<'n> {
    fn drop(&mut self) {
        self.doc.raw(&'\n');
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::parse::keyword::test::Fruit;

    #[test]
    fn simple_items() {
        let mut enc = NetdocEncoder::new();
        enc.item(Fruit::APPLE).arg(&"quite").arg(&77);
        enc.item(Fruit::ORANGE);
        let doc = enc.finish().unwrap();
        assert_eq!(doc, "apple quite 77\norange\n");
    }

    #[test]
    fn object_encoding() {
        let mut enc = NetdocEncoder::new();
        enc.item(Fruit::GUAVA).object("GUAVA MEDITATION", [0_u8; 50]);
        let doc = enc.finish().unwrap();
        assert_eq!(
            doc,
            "guava\n-----BEGIN GUAVA MEDITATION-----\n\
             AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA\n\
             AAA=\n\
             -----END GUAVA MEDITATION-----\n"
        );
    }

    #[test]
    fn cursors_and_slices() {
        let mut enc = NetdocEncoder::new();
        let start = enc.cursor();
        enc.item(Fruit::APPLE).arg(&1);
        let end = enc.cursor();
        enc.item(Fruit::ORANGE).arg(&2);
        assert_eq!(enc.slice(start, end).unwrap(), "apple 1\n");
    }

    #[test]
    fn bad_argument() {
        let mut enc = NetdocEncoder::new();
        enc.item(Fruit::APPLE).arg(&"with space");
        assert!(enc.finish().is_err());

        let mut enc = NetdocEncoder::new();
        enc.item(Fruit::GUAVA).object("bad tag!", [1_u8, 2, 3]);
        assert!(enc.finish().is_err());
    }
}
