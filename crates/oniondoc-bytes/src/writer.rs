//! Internal: Declare the Writer type for oniondoc-bytes.

use crate::EncodeError;
use crate::EncodeResult;
use crate::Writeable;

/// A byte-oriented trait for writing to small arrays.
///
/// Most code will want to use the fact that `Vec<u8>` implements this
/// trait.  To define a new implementation, just define the write_all
/// method.
///
/// # Examples
///
/// You can use a Writer to add bytes explicitly:
/// ```
/// use oniondoc_bytes::Writer;
/// let mut w: Vec<u8> = Vec::new(); // Vec<u8> implements Writer.
/// w.write_u32(0x12345);
/// w.write_u8(0x22);
/// w.write_zeros(3);
/// assert_eq!(w, &[0x00, 0x01, 0x23, 0x45, 0x22, 0x00, 0x00, 0x00]);
/// ```
///
/// You can also use a Writer to encode things that implement the
/// Writeable trait:
///
/// ```
/// use oniondoc_bytes::{Writer,Writeable};
/// let mut w: Vec<u8> = Vec::new();
/// w.write(&4_u16); // The unsigned types all implement Writeable.
///
/// use std::net::Ipv4Addr;
/// let ip = Ipv4Addr::new(127, 0, 0, 1);
/// w.write(&ip);
///
/// assert_eq!(w, &[0x00, 0x04, 0x7f, 0x00, 0x00, 0x01]);
/// ```
pub trait Writer {
    /// Append a slice to the end of this writer.
    fn write_all(&mut self, b: &[u8]);

    /// Append a single u8 to this writer.
    fn write_u8(&mut self, x: u8) {
        self.write_all(&[x]);
    }
    /// Append a single u16 to this writer, encoded in big-endian order.
    fn write_u16(&mut self, x: u16) {
        self.write_all(&x.to_be_bytes());
    }
    /// Append a single u32 to this writer, encoded in big-endian order.
    fn write_u32(&mut self, x: u32) {
        self.write_all(&x.to_be_bytes());
    }
    /// Append a single u64 to this writer, encoded in big-endian order.
    fn write_u64(&mut self, x: u64) {
        self.write_all(&x.to_be_bytes());
    }
    /// Write n bytes to this writer, all with the value zero.
    fn write_zeros(&mut self, n: usize) {
        let v = vec![0_u8; n];
        self.write_all(&v[..]);
    }
    /// Encode a Writeable object onto this writer, using its
    /// write_onto method.
    fn write<E: Writeable + ?Sized>(&mut self, e: &E) -> EncodeResult<()> {
        e.write_onto(self)
    }
    /// Arrange to write a u8 length, and some data whose encoding is that
    /// length.
    ///
    /// Prefer to use this function, rather than manual length calculations
    /// and an ad-hoc `write_u8`.
    ///
    /// The returned [`NestedWriter`] should be used to write the contents,
    /// inside the byte-counted section.
    ///
    /// Then you **must** call `finish` to finalise the buffer.
    fn write_nested_u8len(&mut self) -> NestedWriter<'_, Self> {
        NestedWriter {
            outer: self,
            inner: vec![],
        }
    }
}

/// Work-in-progress state for writing a nested (length-counted) item.
///
/// You must call `finish` !
pub struct NestedWriter<'w, W>
where
    W: ?Sized,
{
    /// The outer writer.
    outer: &'w mut W,
    /// Our inner buffer.
    ///
    /// Caller can use us as a `Writer` via `Deref`/`DerefMut`.
    ///
    /// (We must allocate here because some `Writer`s are streaming.)
    inner: Vec<u8>,
}

impl<'w, W> std::ops::Deref for NestedWriter<'w, W>
where
    W: ?Sized,
{
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        &self.inner
    }
}

impl<'w, W> std::ops::DerefMut for NestedWriter<'w, W>
where
    W: ?Sized,
{
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.inner
    }
}

impl<'w, W> NestedWriter<'w, W>
where
    W: Writer + ?Sized,
{
    /// End writing the nested data, and update the length appropriately.
    ///
    /// You must check the return value.  It will only be `Err` if the
    /// amount you wrote doesn't fit into the length field.
    pub fn finish(self) -> Result<(), EncodeError> {
        let length: u8 = self
            .inner
            .len()
            .try_into()
            .map_err(|_| EncodeError::BadLengthValue)?;
        self.outer.write_u8(length);
        self.outer.write_all(&self.inner);
        Ok(())
    }
}

impl Writer for Vec<u8> {
    fn write_all(&mut self, b: &[u8]) {
        self.extend_from_slice(b);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn write_ints() {
        let mut v: Vec<u8> = Vec::new();
        v.write_u8(1);
        v.write_u16(2);
        v.write_u32(3);
        v.write_u64(4);

        assert_eq!(
            &v[..],
            &[1, 0, 2, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 4][..]
        );
    }

    #[test]
    fn write_slice() {
        let mut v = Vec::new();
        v.write_u16(0x5468);
        v.write(&b"ey're good dogs, Bront"[..]).unwrap();

        assert_eq!(&v[..], &b"They're good dogs, Bront"[..]);
    }

    #[test]
    fn nested() {
        let mut v: Vec<u8> = b"abc".to_vec();

        let mut w = v.write_nested_u8len();
        w.write_u8(b'x');
        w.finish().unwrap();

        assert_eq!(&v, b"abc\x01x");

        let mut w = v.write_nested_u8len();
        w.write_zeros(256);
        assert!(matches!(
            w.finish().err().unwrap(),
            EncodeError::BadLengthValue
        ));
    }
}
