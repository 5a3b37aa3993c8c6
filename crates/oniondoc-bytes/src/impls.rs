//! Implementations of Writeable and Readable for several items that
//! we use in the descriptor formats.
//!
//! These don't need to be in a separate module, but for convenience
//! this is where I'm putting them.

use crate::{Error, Readable, Reader, Result, Writeable, Writer};

// ----------------------------------------------------------------------

/// Vec<u8> is the main type that implements Writer.
impl Writeable for Vec<u8> {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> crate::EncodeResult<()> {
        b.write_all(&self[..]);
        Ok(())
    }
}

impl Writeable for [u8] {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> crate::EncodeResult<()> {
        b.write_all(self);
        Ok(())
    }
}

impl<const N: usize> Writeable for [u8; N] {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> crate::EncodeResult<()> {
        b.write_all(&self[..]);
        Ok(())
    }
}

impl<const N: usize> Readable for [u8; N] {
    fn take_from(b: &mut Reader<'_>) -> Result<Self> {
        // The unwrap here is guaranteed to succeed: take returns exactly
        // N bytes or an error.
        Ok(b.take(N)?.try_into().expect("take gave wrong length?"))
    }
}

// ----------------------------------------------------------------------

/// Make Readable and Writeable implementations for a provided
/// unsigned type, delegating to the `take_*` and `write_*` functions.
macro_rules! impl_u {
    ( $t:ty, $wrfn:ident, $rdfn:ident ) => {
        impl Writeable for $t {
            fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> crate::EncodeResult<()> {
                b.$wrfn(*self);
                Ok(())
            }
        }
        impl Readable for $t {
            fn take_from(b: &mut Reader<'_>) -> Result<Self> {
                b.$rdfn()
            }
        }
    };
}

impl_u!(u8, write_u8, take_u8);
impl_u!(u16, write_u16, take_u16);
impl_u!(u32, write_u32, take_u32);
impl_u!(u64, write_u64, take_u64);

// ----------------------------------------------------------------------

/// Implement Readable and Writeable for IP addresses.
mod net_impls {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    impl Writeable for Ipv4Addr {
        fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> crate::EncodeResult<()> {
            b.write_all(&self.octets()[..]);
            Ok(())
        }
    }

    impl Readable for Ipv4Addr {
        fn take_from(b: &mut Reader<'_>) -> Result<Self> {
            Ok(b.take_u32()?.into())
        }
    }

    impl Writeable for Ipv6Addr {
        fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> crate::EncodeResult<()> {
            b.write_all(&self.octets()[..]);
            Ok(())
        }
    }

    impl Readable for Ipv6Addr {
        fn take_from(b: &mut Reader<'_>) -> Result<Self> {
            let bytes: [u8; 16] = b.extract()?;
            Ok(bytes.into())
        }
    }
}

/// Implement Readable and Writeable for the cryptographic key types.
mod crypto_impls {
    use super::*;
    use oniondoc_llcrypto::pk::{curve25519, ed25519, rsa};

    impl Readable for ed25519::Ed25519Identity {
        fn take_from(b: &mut Reader<'_>) -> Result<Self> {
            let bytes = b.take(32)?;
            Ok(Self::from_bytes(bytes).expect("take gave wrong length?"))
        }
    }
    impl Writeable for ed25519::Ed25519Identity {
        fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> crate::EncodeResult<()> {
            b.write_all(self.as_bytes());
            Ok(())
        }
    }
    impl Readable for ed25519::Signature {
        fn take_from(b: &mut Reader<'_>) -> Result<Self> {
            let bytes: [u8; 64] = b.extract()?;
            Ok(Self::from_bytes(&bytes))
        }
    }
    impl Writeable for ed25519::Signature {
        fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> crate::EncodeResult<()> {
            b.write_all(&self.to_bytes()[..]);
            Ok(())
        }
    }
    impl Readable for curve25519::PublicKey {
        fn take_from(b: &mut Reader<'_>) -> Result<Self> {
            let bytes: [u8; 32] = b.extract()?;
            Ok(bytes.into())
        }
    }
    impl Writeable for curve25519::PublicKey {
        fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> crate::EncodeResult<()> {
            b.write_all(self.as_bytes());
            Ok(())
        }
    }
    impl Readable for rsa::RsaIdentity {
        fn take_from(b: &mut Reader<'_>) -> Result<Self> {
            let bytes = b.take(rsa::RSA_ID_LEN)?;
            rsa::RsaIdentity::from_bytes(bytes)
                .ok_or_else(|| Error::InvalidMessage("wrong number of bytes from take".into()))
        }
    }
    impl Writeable for rsa::RsaIdentity {
        fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> crate::EncodeResult<()> {
            b.write_all(self.as_bytes());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::{Reader, Writer};
    use hex_literal::hex;

    #[test]
    fn vec_u8() {
        let v: Vec<u8> = vec![1, 2, 3, 4];
        let mut w = Vec::new();
        w.write(&v).unwrap();
        assert_eq!(w, &[1, 2, 3, 4]);
    }

    #[test]
    fn u_types() {
        let mut w = Vec::new();
        w.write(&7_u8).unwrap();
        w.write(&5_u16).unwrap();
        w.write(&0xabcd_u32).unwrap();
        w.write(&0x1234567890abcdef_u64).unwrap();
        assert_eq!(
            &w[..],
            &hex!("07 0005 0000abcd 1234567890abcdef")[..]
        );

        let mut r = Reader::from_slice(&w[..]);
        assert_eq!(r.extract::<u8>().unwrap(), 7);
        assert_eq!(r.extract::<u16>().unwrap(), 5);
        assert_eq!(r.extract::<u32>().unwrap(), 0xabcd);
        assert_eq!(r.extract::<u64>().unwrap(), 0x1234567890abcdef);
    }

    #[test]
    fn ip_addrs() {
        use std::net::{Ipv4Addr, Ipv6Addr};
        let mut w = Vec::new();
        w.write(&Ipv4Addr::new(1, 2, 3, 4)).unwrap();
        w.write(&Ipv6Addr::new(1, 2, 3, 4, 5, 6, 7, 8)).unwrap();
        assert_eq!(
            &w[..],
            &hex!("01020304 00010002000300040005000600070008")[..]
        );

        let mut r = Reader::from_slice(&w[..]);
        let v4: Ipv4Addr = r.extract().unwrap();
        let v6: Ipv6Addr = r.extract().unwrap();
        assert_eq!(v4, Ipv4Addr::new(1, 2, 3, 4));
        assert_eq!(v6, Ipv6Addr::new(1, 2, 3, 4, 5, 6, 7, 8));
    }

    #[test]
    fn ed_identity() {
        use oniondoc_llcrypto::pk::ed25519::Ed25519Identity;
        let id = Ed25519Identity::new(*b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let mut w = Vec::new();
        w.write(&id).unwrap();
        assert_eq!(&w[..], &b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"[..]);
        let mut r = Reader::from_slice(&w[..]);
        let id2: Ed25519Identity = r.extract().unwrap();
        assert_eq!(id, id2);
    }
}
