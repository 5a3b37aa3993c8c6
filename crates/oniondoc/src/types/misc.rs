//! Types used to parse arguments of entries in a descriptor document.
//!
//! These types shouldn't be exposed outside of this crate.

pub(crate) use b64impl::*;
pub(crate) use edcert::*;
pub(crate) use intimpl::*;
pub(crate) use rsa::*;

/// Describes a value that can be decoded from a bunch of bytes.
///
/// Used for decoding the objects between BEGIN and END tags.
pub(crate) trait FromBytes: Sized {
    /// Try to parse a value of this type from a byte slice.
    fn from_bytes(b: &[u8], p: crate::Pos) -> crate::Result<Self>;
    /// Try to parse a value of this type from a vector of bytes;
    /// consume that vector if possible.
    fn from_vec(v: Vec<u8>, p: crate::Pos) -> crate::Result<Self> {
        Self::from_bytes(&v[..], p)
    }
}

/// Types for decoding base64-encoded values.
mod b64impl {
    use crate::{Error, NetdocErrorKind as EK, Pos, Result};
    use base64ct::{Base64Unpadded, Encoding};
    use std::str::FromStr;

    /// A byte array, encoded in base64 with no trailing `=` padding.
    pub(crate) struct B64(Vec<u8>);

    impl FromStr for B64 {
        type Err = Error;
        fn from_str(s: &str) -> Result<Self> {
            let v = Base64Unpadded::decode_vec(s)
                .map_err(|_| EK::BadArgument.at_pos(Pos::at(s)).with_msg("Invalid base64"))?;
            Ok(B64(v))
        }
    }

    impl B64 {
        /// Return the byte array from this object.
        pub(crate) fn as_bytes(&self) -> &[u8] {
            &self.0[..]
        }
        /// Try to convert this object into an array of N bytes.
        ///
        /// Return an error if the length is wrong.
        pub(crate) fn into_array<const N: usize>(self) -> Result<[u8; N]> {
            self.0
                .try_into()
                .map_err(|_| EK::BadArgument.with_msg("Invalid length on base64 data"))
        }
    }

    impl From<B64> for Vec<u8> {
        fn from(w: B64) -> Vec<u8> {
            w.0
        }
    }
}

/// Types for decoding integers with a strict syntax.
mod intimpl {
    use crate::{Error, NetdocErrorKind as EK, Pos, Result};
    use std::str::FromStr;

    /// An unsigned integer in canonical decimal form.
    ///
    /// The accepted syntax is strict: decimal digits only, no sign prefix,
    /// and no leading zeros (except for a sole `0`).
    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    pub(crate) struct DecimalUint<T>(pub(crate) T);

    impl<T> FromStr for DecimalUint<T>
    where
        T: FromStr<Err = std::num::ParseIntError>,
    {
        type Err = Error;
        fn from_str(s: &str) -> Result<Self> {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(EK::BadArgument
                    .at_pos(Pos::at(s))
                    .with_msg("not a canonical decimal integer"));
            }
            if s.len() > 1 && s.starts_with('0') {
                return Err(EK::BadArgument
                    .at_pos(Pos::at(s))
                    .with_msg("leading zero on integer"));
            }
            let v = s.parse::<T>().map_err(|e| {
                let e: Error = e.into();
                e.at_pos(Pos::at(s))
            })?;
            Ok(DecimalUint(v))
        }
    }
}

/// Types for decoding RSA keys.
mod rsa {
    use crate::{NetdocErrorKind as EK, Pos, Result};
    use std::ops::RangeBounds;
    use oniondoc_llcrypto::pk::rsa::PublicKey;

    /// The exponent we require on all RSA keys in a descriptor.
    pub(crate) const RSA_FIXED_EXPONENT: u32 = 65537;

    /// An RSA public key, as parsed from a base64-encoded object.
    ///
    /// The key's properties (exponent and size) haven't been checked.
    #[derive(Clone, Debug)]
    pub(crate) struct RsaPublic(PublicKey, Pos);

    impl From<RsaPublic> for PublicKey {
        fn from(k: RsaPublic) -> PublicKey {
            k.0
        }
    }
    impl super::FromBytes for RsaPublic {
        fn from_bytes(b: &[u8], pos: Pos) -> Result<Self> {
            let key = PublicKey::from_der(b)
                .ok_or_else(|| EK::BadObjectVal.with_msg("unable to decode RSA public key"))?;
            Ok(RsaPublic(key, pos))
        }
    }
    impl RsaPublic {
        /// Give an error if the exponent of this key is not 'e'.
        pub(crate) fn check_exponent(self, e: u32) -> Result<Self> {
            if self.0.exponent_is(e) {
                Ok(self)
            } else {
                Err(EK::BadObjectVal
                    .at_pos(self.1)
                    .with_msg("invalid RSA exponent"))
            }
        }
        /// Give an error if the length of this key's modulus, in
        /// bits, is not contained in 'bounds'.
        pub(crate) fn check_len<B: RangeBounds<usize>>(self, bounds: B) -> Result<Self> {
            if bounds.contains(&self.0.bits()) {
                Ok(self)
            } else {
                Err(EK::BadObjectVal
                    .at_pos(self.1)
                    .with_msg("invalid RSA length"))
            }
        }
        /// Give an error if the length of this key's modulus, in
        /// bits, is not exactly `n`.
        pub(crate) fn check_len_eq(self, n: usize) -> Result<Self> {
            self.check_len(n..=n)
        }
    }
}

/// Types for decoding Ed25519 certificates.
mod edcert {
    use crate::{NetdocErrorKind as EK, Pos, Result};
    use oniondoc_cert::{CertType, Ed25519Cert, KeyUnknownCert};

    /// An ed25519 certificate as parsed from a descriptor document, with
    /// signature not validated.
    #[derive(Debug, Clone)]
    pub(crate) struct UnvalidatedEdCert(KeyUnknownCert, Pos);

    impl super::FromBytes for UnvalidatedEdCert {
        fn from_bytes(b: &[u8], p: Pos) -> Result<Self> {
            let cert = Ed25519Cert::decode(b).map_err(|e| {
                EK::BadCertificate
                    .at_pos(p)
                    .with_msg("Bad certificate")
                    .with_source(e)
            })?;

            Ok(Self(cert, p))
        }
        fn from_vec(v: Vec<u8>, p: Pos) -> Result<Self> {
            Self::from_bytes(&v[..], p)
        }
    }
    impl UnvalidatedEdCert {
        /// Give an error if this certificate's type is not `desired_type`.
        pub(crate) fn check_cert_type(self, desired_type: CertType) -> Result<Self> {
            if self.0.peek_cert_type() != desired_type {
                return Err(EK::BadCertificate.at_pos(self.1).with_msg(format!(
                    "bad certificate type {} (wanted {})",
                    self.0.peek_cert_type(),
                    desired_type
                )));
            }
            Ok(self)
        }
        /// Consume this object and return the inner certificate.
        pub(crate) fn into_unchecked(self) -> KeyUnknownCert {
            self.0
        }
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::Result;

    #[test]
    fn base64() -> Result<()> {
        // Unpadded base64 is accepted; padded base64 is not.
        let b: B64 = "Mi43MTgyOA".parse()?;
        assert_eq!(b.as_bytes(), &b"2.71828"[..]);
        assert!("Mi43MTgyOA==".parse::<B64>().is_err());
        assert!("%%%%".parse::<B64>().is_err());

        let b: B64 = "Mi43MTgyOA".parse()?;
        assert!(b.into_array::<3>().is_err());
        let b: B64 = "Mi43MTgyOA".parse()?;
        assert_eq!(b.into_array::<7>().unwrap(), *b"2.71828");
        Ok(())
    }

    #[test]
    fn decimal() {
        assert_eq!("0".parse::<DecimalUint<u32>>().unwrap().0, 0);
        assert_eq!("720".parse::<DecimalUint<u16>>().unwrap().0, 720);
        assert!("007".parse::<DecimalUint<u32>>().is_err());
        assert!("+7".parse::<DecimalUint<u32>>().is_err());
        assert!("-7".parse::<DecimalUint<u32>>().is_err());
        assert!("".parse::<DecimalUint<u32>>().is_err());
        assert!("seven".parse::<DecimalUint<u32>>().is_err());
        // Out of range for the target type.
        assert!("65536".parse::<DecimalUint<u16>>().is_err());
    }
}
