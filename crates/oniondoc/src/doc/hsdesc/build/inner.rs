//! Functionality for encoding the inner document of an onion service
//! descriptor.
//!
//! NOTE: `HsDescInner` is a private helper for building onion service
//! descriptors, and is not meant to be used directly.  Services will use
//! [`HsDescBuilder`](super::HsDescBuilder) to build and encode
//! descriptors.

use crate::doc::hsdesc::inner::HsInnerKwd;
use crate::doc::hsdesc::{IntroAuthType, IntroEncKey, IntroPointDesc};
use crate::encode::NetdocEncoder;
use crate::linkspec::LinkSpecType;
use super::NetdocBuilder;

use oniondoc_bytes::{EncodeError, Writer};
use oniondoc_cert::{CertType, CertifiedKey, Ed25519Cert};
use oniondoc_llcrypto::pk::ed25519::{self, Ed25519Identity};
use oniondoc_llcrypto::pk::keymanip::convert_curve25519_to_ed25519_public;

use base64ct::{Base64Unpadded, Encoding};
use rand::{CryptoRng, RngCore};
use smallvec::SmallVec;

use std::time::SystemTime;

/// The representation of the inner document of an onion service
/// descriptor.
pub(super) struct HsDescInner<'a> {
    /// The descriptor signing keypair, which certifies each introduction
    /// point's keys.
    pub(super) hs_desc_sign: &'a ed25519::Keypair,
    /// A list of recognized CREATE handshakes that this onion service
    /// supports.
    pub(super) create2_formats: &'a [u16],
    /// A list of authentication types that this onion service requires.
    pub(super) auth_required: Option<&'a SmallVec<[IntroAuthType; 2]>>,
    /// The introduction points used to contact the onion service, in
    /// order.
    pub(super) intro_points: &'a [IntroPointDesc],
    /// The expiration time of an introduction point authentication key
    /// certificate.
    pub(super) intro_auth_key_cert_expiry: SystemTime,
    /// The expiration time of an introduction point encryption key
    /// certificate.
    pub(super) intro_enc_key_cert_expiry: SystemTime,
    /// The caller's clock, for the create-side certificate expiry check.
    pub(super) now: SystemTime,
}

/// Encode the link specifiers of `ip` into the binary list format,
/// checking the restrictions that the decoder will enforce.
fn encode_link_specifiers(ip: &IntroPointDesc) -> Result<Vec<u8>, EncodeError> {
    let nspec: u8 = ip
        .link_specifiers
        .len()
        .try_into()
        .map_err(|_| EncodeError::bad_api_usage("Too many link specifiers."))?;
    if nspec == 0 {
        return Err(EncodeError::bad_api_usage(
            "An introduction point needs at least one link specifier.",
        ));
    }
    for known in [
        LinkSpecType::ORPORT_V4,
        LinkSpecType::ORPORT_V6,
        LinkSpecType::RSAID,
    ] {
        if ip
            .link_specifiers
            .iter()
            .filter(|ls| ls.lstype() == known)
            .count()
            > 1
        {
            return Err(EncodeError::bad_api_usage(
                "Duplicate link specifier type within one introduction point.",
            ));
        }
    }

    let mut encoded = vec![];
    encoded.write_u8(nspec);
    for link_spec in &ip.link_specifiers {
        encoded.write(link_spec)?;
    }
    Ok(encoded)
}

impl<'a> NetdocBuilder for HsDescInner<'a> {
    fn build_sign<R: RngCore + CryptoRng>(self, _: &mut R) -> Result<String, EncodeError> {
        use HsInnerKwd::*;

        let HsDescInner {
            hs_desc_sign,
            create2_formats,
            auth_required,
            intro_points,
            intro_auth_key_cert_expiry,
            intro_enc_key_cert_expiry,
            now,
        } = self;

        if create2_formats.is_empty() {
            return Err(EncodeError::bad_api_usage(
                "At least one create handshake type is needed.",
            ));
        }

        let mut encoder = NetdocEncoder::new();

        {
            let mut create2_formats_enc = encoder.item(CREATE2_FORMATS);
            for fmt in create2_formats {
                create2_formats_enc = create2_formats_enc.arg(fmt);
            }
        }

        if let Some(auth_required) = auth_required {
            let mut auth_required_enc = encoder.item(AUTHENTICATION_REQUIRED);
            for auth in auth_required {
                auth_required_enc = auth_required_enc.arg(auth);
            }
        }

        // The introduction points are emitted in the order provided:
        // round-tripping a descriptor must preserve it.
        for intro_point in intro_points {
            let link_specifiers = encode_link_specifiers(intro_point)?;
            encoder
                .item(INTRODUCTION_POINT)
                .arg(&Base64Unpadded::encode_string(&link_specifiers));

            // The introduction point authentication key is certified by
            // the descriptor signing key.
            let auth_key: &ed25519::PublicKey = intro_point.auth_key.as_ref();
            let signed_auth_key = Ed25519Cert::constructor()
                .cert_type(CertType::HS_IP_V_SIGNING)
                .expiration(intro_auth_key_cert_expiry)
                .signing_key(Ed25519Identity::from(hs_desc_sign.verifying_key()))
                .cert_key(CertifiedKey::Ed25519(auth_key.into()))
                .encode_and_sign(hs_desc_sign, now)
                .map_err(|e| EncodeError::bad_api_usage(e.to_string()))?;
            encoder
                .item(AUTH_KEY)
                .object("ED25519 CERT", signed_auth_key.as_ref());

            match &intro_point.enc_key {
                IntroEncKey::Ntor(svc_enc_key) => {
                    encoder.item(ENC_KEY).arg(&"ntor").arg(&Base64Unpadded::encode_string(
                        &svc_enc_key.as_ref().as_bytes()[..],
                    ));

                    // The certified subject is the ed25519 equivalent of
                    // the curve25519 encryption key, with its sign bit set
                    // to 0.
                    //
                    // (Setting the sign bit to zero has a 50% chance of
                    // making the ed25519 key useless for checking
                    // signatures; that's fine, since the subject never
                    // signs anything.)
                    let signbit = 0;
                    let ed_enc_key =
                        convert_curve25519_to_ed25519_public(svc_enc_key.as_ref(), signbit)
                            .ok_or_else(|| {
                                EncodeError::bad_api_usage(
                                    "failed to convert curve25519 pk to ed25519 pk",
                                )
                            })?;

                    let signed_enc_key = Ed25519Cert::constructor()
                        .cert_type(CertType::HS_IP_CC_SIGNING)
                        .expiration(intro_enc_key_cert_expiry)
                        .signing_key(Ed25519Identity::from(hs_desc_sign.verifying_key()))
                        .cert_key(CertifiedKey::Ed25519(Ed25519Identity::from(&ed_enc_key)))
                        .encode_and_sign(hs_desc_sign, now)
                        .map_err(|e| EncodeError::bad_api_usage(e.to_string()))?;

                    encoder
                        .item(ENC_KEY_CERTIFICATION)
                        .object("ED25519 CERT", signed_enc_key.as_ref());
                }
                IntroEncKey::Legacy { key, crosscert } => {
                    encoder.item(ENC_KEY).arg(&"legacy").object("RSA PUBLIC KEY", key.to_der());
                    encoder
                        .item(ENC_KEY_CERTIFICATION)
                        .object("CROSSCERT", crosscert.as_ref());
                }
            }
        }

        encoder.finish()
    }
}
