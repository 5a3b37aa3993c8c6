//! Functionality for encoding the outer document of an onion service
//! descriptor.
//!
//! NOTE: `HsDescOuter` is a private helper for building onion service
//! descriptors, and is not meant to be used directly.  Services will use
//! [`HsDescBuilder`](super::HsDescBuilder) to build and encode
//! descriptors.

use crate::doc::hsdesc::outer::{
    HsOuterKwd, HS_DESC_SIGNATURE_PREFIX, HS_DESC_VERSION_MAX,
};
use crate::doc::hsdesc::HS_DESC_MAX_LEN;
use crate::encode::NetdocEncoder;
use super::NetdocBuilder;

use oniondoc_bytes::EncodeError;
use oniondoc_cert::EncodedEd25519Cert;
use oniondoc_hscrypto::RevisionCounter;
use oniondoc_llcrypto::pk::ed25519;

use base64ct::{Base64Unpadded, Encoding};
use rand::{CryptoRng, RngCore};

/// The representation of the outer wrapper of an onion service
/// descriptor.
pub(super) struct HsDescOuter<'a> {
    /// The short-term descriptor signing keypair.
    pub(super) hs_desc_sign: &'a ed25519::Keypair,
    /// The descriptor signing key certificate.
    pub(super) hs_desc_sign_cert: EncodedEd25519Cert,
    /// The lifetime of this descriptor, in minutes.
    pub(super) lifetime: u16,
    /// A revision counter to tell whether this descriptor is more or less
    /// recent than another one for the same blinded ID.
    pub(super) revision_counter: RevisionCounter,
    /// The encrypted inner document of the onion service descriptor.
    pub(super) encrypted: Vec<u8>,
}

impl<'a> NetdocBuilder for HsDescOuter<'a> {
    fn build_sign<R: RngCore + CryptoRng>(self, _: &mut R) -> Result<String, EncodeError> {
        use oniondoc_llcrypto::pk::ed25519::Signer as _;
        use HsOuterKwd::*;

        let HsDescOuter {
            hs_desc_sign,
            hs_desc_sign_cert,
            lifetime,
            revision_counter,
            encrypted,
        } = self;

        let mut encoder = NetdocEncoder::new();
        let beginning = encoder.cursor();
        encoder.item(HS_DESCRIPTOR).arg(&HS_DESC_VERSION_MAX);
        encoder.item(DESCRIPTOR_LIFETIME).arg(&lifetime);
        encoder
            .item(DESCRIPTOR_SIGNING_KEY_CERT)
            .object("ED25519 CERT", hs_desc_sign_cert.as_ref());
        encoder.item(REVISION_COUNTER).arg(&*revision_counter);
        encoder.item(ENCRYPTED).object("MESSAGE", encrypted);
        let end = encoder.cursor();

        // The signature covers every byte up to and including the newline
        // before the "signature" entry, with a fixed prefix in front.
        let mut text = HS_DESC_SIGNATURE_PREFIX.to_vec();
        text.extend_from_slice(encoder.slice(beginning, end)?.as_bytes());
        let signature = hs_desc_sign.sign(&text);

        encoder
            .item(SIGNATURE)
            .arg(&Base64Unpadded::encode_string(&signature.to_bytes()));

        let text = encoder.finish()?;
        if text.len() > HS_DESC_MAX_LEN {
            return Err(EncodeError::bad_api_usage(
                "encoded descriptor exceeds the maximum length",
            ));
        }
        Ok(text)
    }
}
