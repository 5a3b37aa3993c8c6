//! Link specifier objects: how to reach the relay acting as an
//! introduction point.
//!
//! Link specifiers ride inside an introduction-point record as a
//! base64-encoded, length-prefixed binary list.  Each specifier is a
//! one-byte type, a one-byte length, and a value.

use std::net::{IpAddr, SocketAddr};

use oniondoc_bytes::{EncodeResult, Readable, Reader, Result, Writeable, Writer};
use oniondoc_llcrypto::pk::rsa::RsaIdentity;

/// A piece of information about a relay and how to connect to it.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSpec {
    /// The TCP address of a relay.
    OrPort(IpAddr, u16),
    /// The legacy (RSA) identity fingerprint of a relay.
    RsaId(RsaIdentity),
    /// A link specifier that we didn't recognize.
    ///
    /// Its body is preserved byte-for-byte, so that re-encoding a parsed
    /// list yields the original bytes.
    Unrecognized(LinkSpecType, Vec<u8>),
}

/// A numeric identifier for the type of a [`LinkSpec`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LinkSpecType(u8);

impl LinkSpecType {
    /// Indicates an IPv4 address-and-port link specifier.
    pub const ORPORT_V4: LinkSpecType = LinkSpecType(0);
    /// Indicates an IPv6 address-and-port link specifier.
    pub const ORPORT_V6: LinkSpecType = LinkSpecType(1);
    /// Indicates a legacy (RSA) identity fingerprint link specifier.
    pub const RSAID: LinkSpecType = LinkSpecType(2);
}

impl From<u8> for LinkSpecType {
    fn from(n: u8) -> Self {
        LinkSpecType(n)
    }
}
impl From<LinkSpecType> for u8 {
    fn from(t: LinkSpecType) -> u8 {
        t.0
    }
}

impl Readable for LinkSpec {
    fn take_from(b: &mut Reader<'_>) -> Result<Self> {
        let lstype = b.take_u8()?.into();
        b.read_nested_u8len(|r| Self::from_type_and_body(lstype, r))
    }
}
impl Writeable for LinkSpec {
    fn write_onto<B: Writer + ?Sized>(&self, w: &mut B) -> EncodeResult<()> {
        w.write_u8(self.lstype().into());
        {
            let mut inner = w.write_nested_u8len();
            self.encode_body(&mut *inner)?;
            inner.finish()?;
        }
        Ok(())
    }
}

impl From<&SocketAddr> for LinkSpec {
    fn from(sa: &SocketAddr) -> Self {
        LinkSpec::OrPort(sa.ip(), sa.port())
    }
}
impl From<SocketAddr> for LinkSpec {
    fn from(sa: SocketAddr) -> Self {
        (&sa).into()
    }
}
impl From<RsaIdentity> for LinkSpec {
    fn from(id: RsaIdentity) -> Self {
        LinkSpec::RsaId(id)
    }
}

impl LinkSpec {
    /// Try to create a LinkSpec of encoded type `lstype`, taking its body
    /// from a given reader `r`.
    ///
    /// Does not check whether `r` is exhausted at the end of the operation
    /// or not.
    fn from_type_and_body(lstype: LinkSpecType, r: &mut Reader<'_>) -> Result<Self> {
        use LinkSpecType as LST;
        Ok(match lstype {
            LST::ORPORT_V4 => {
                let addr = IpAddr::V4(r.extract()?);
                LinkSpec::OrPort(addr, r.take_u16()?)
            }
            LST::ORPORT_V6 => {
                let addr = IpAddr::V6(r.extract()?);
                LinkSpec::OrPort(addr, r.take_u16()?)
            }
            LST::RSAID => LinkSpec::RsaId(r.extract()?),
            _ => LinkSpec::Unrecognized(lstype, r.take_rest().into()),
        })
    }

    /// Return the type code for this linkspec.
    pub fn lstype(&self) -> LinkSpecType {
        use LinkSpecType as LST;
        match self {
            LinkSpec::OrPort(IpAddr::V4(_), _) => LST::ORPORT_V4,
            LinkSpec::OrPort(IpAddr::V6(_), _) => LST::ORPORT_V6,
            LinkSpec::RsaId(_) => LST::RSAID,
            LinkSpec::Unrecognized(lstype, _) => *lstype,
        }
    }

    /// Try to encode the body of this linkspec onto a given writer.
    fn encode_body<W: Writer + ?Sized>(&self, w: &mut W) -> EncodeResult<()> {
        use LinkSpec::*;
        match self {
            OrPort(IpAddr::V4(v4), port) => {
                w.write(v4)?;
                w.write_u16(*port);
            }
            OrPort(IpAddr::V6(v6), port) => {
                w.write(v6)?;
                w.write_u16(*port);
            }
            RsaId(r) => {
                w.write(r)?;
            }
            Unrecognized(_, vec) => {
                w.write_all(&vec[..]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use hex_literal::hex;
    use oniondoc_bytes::{Reader, Writer};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_parse_enc() {
        fn t(b: &[u8], val: &LinkSpec) {
            let mut r = Reader::from_slice(b);
            let got: LinkSpec = r.extract().unwrap();
            assert_eq!(r.remaining(), 0);
            assert_eq!(&got, val);
            let mut v = Vec::new();
            v.write(val).expect("Encoding failure");
            assert_eq!(&v[..], b);
        }

        t(
            &hex!("00 06 01020304 0050"),
            &LinkSpec::OrPort(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 80),
        );
        t(
            &hex!("01 12 0001 0002 0003 0004 0005 0006 0007 0008 01bb"),
            &LinkSpec::OrPort(IpAddr::V6(Ipv6Addr::new(1, 2, 3, 4, 5, 6, 7, 8)), 443),
        );
        t(
            &[
                2, 20, 104, 101, 108, 108, 111, 32, 119, 111, 114, 108, 100, 33, 33, 33, 33, 33,
                33, 33, 33, 33,
            ],
            &LinkSpec::RsaId(RsaIdentity::from_bytes(b"hello world!!!!!!!!!").unwrap()),
        );

        t(
            &[77, 7, 115, 116, 114, 97, 110, 103, 101],
            &LinkSpec::Unrecognized(77.into(), (&b"strange"[..]).into()),
        );
    }

    #[test]
    fn test_parse_bad() {
        use oniondoc_bytes::Error;

        fn t(b: &[u8]) -> Error {
            let mut r = Reader::from_slice(b);
            let got: Result<LinkSpec> = r.extract();
            got.err().unwrap()
        }

        // Truncated bodies.
        assert_eq!(t(&hex!("00 03")), Error::Truncated);
        assert_eq!(t(&hex!("00 06 01020304")), Error::Truncated);
        assert_eq!(t(&hex!("99 07 010203")), Error::Truncated);
        // Known type whose length does not match its body.
        assert_eq!(t(&hex!("00 07 01020304 0050 00")), Error::ExtraneousBytes);
    }
}
