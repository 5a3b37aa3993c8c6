//! Onion service descriptor encoding.

mod inner;
mod outer;

use super::desc_enc::{self, HsDescEncryption};
use super::{IntroAuthType, IntroPointDesc, HS_DESC_ENCRYPTION_STRING_CONST};
use oniondoc_bytes::EncodeError;
use oniondoc_cert::{CertType, CertifiedKey, Ed25519Cert};
use oniondoc_hscrypto::pk::HsBlindIdKeypair;
use oniondoc_hscrypto::{RevisionCounter, Subcredential};
use oniondoc_llcrypto::pk::ed25519::{self, Ed25519Identity};

use derive_builder::Builder;
use rand::{CryptoRng, RngCore};
use smallvec::SmallVec;

use std::time::SystemTime;

/// A trait for building and signing a document.
///
/// Implemented by the builders for each document layer; the provided
/// randomness is used wherever the layer's construction calls for it (for
/// the descriptor, the encryption salt).
pub trait NetdocBuilder {
    /// Build the document into textual form.
    fn build_sign<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<String, EncodeError>;
}

/// A builder for encoding onion service descriptors.
///
/// To encode a descriptor, fill in every field of this builder, then call
/// [`build_sign`](NetdocBuilder::build_sign) with the randomness source to
/// use.  Given identical inputs and identical randomness, the resulting
/// text is byte-for-byte identical.
#[derive(Builder)]
#[builder(public, pattern = "owned", build_fn(private))]
struct HsDesc<'a> {
    /// The blinded identity keypair for the current period
    /// (used to sign the descriptor signing key certificate).
    blinded_id: &'a HsBlindIdKeypair,
    /// The short-term descriptor signing keypair.
    hs_desc_sign: &'a ed25519::Keypair,
    /// The expiration time of the descriptor signing key certificate.
    hs_desc_sign_cert_expiry: SystemTime,
    /// A list of recognized CREATE handshakes that this onion service
    /// supports, in the order in which they should be listed.
    create2_formats: &'a [u16],
    /// A list of authentication types that this onion service requires,
    /// or None if introduction is unrestricted.
    auth_required: Option<SmallVec<[IntroAuthType; 2]>>,
    /// The introduction points used to contact the onion service, in the
    /// order in which they should be listed.
    intro_points: &'a [IntroPointDesc],
    /// The expiration time of the introduction-point authentication key
    /// certificates.
    intro_auth_key_cert_expiry: SystemTime,
    /// The expiration time of the introduction-point encryption key
    /// certificates.
    intro_enc_key_cert_expiry: SystemTime,
    /// The lifetime of this descriptor, in minutes.
    ///
    /// This doesn't actually list the starting time or the end time for
    /// the descriptor: presumably, because we didn't want to leak the
    /// onion service's view of the wallclock.
    lifetime: u16,
    /// A revision counter to tell whether this descriptor is more or less
    /// recent than another one for the same blinded ID.
    revision_counter: RevisionCounter,
    /// The subcredential of the onion service, to be mixed into the
    /// envelope keys when client authorization is in use.
    subcredential: Option<Subcredential>,
    /// The caller's clock.  Used to refuse issuing certificates whose
    /// expiration is already past.
    now: SystemTime,
}

impl<'a> NetdocBuilder for HsDescBuilder<'a> {
    fn build_sign<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<String, EncodeError> {
        let hs_desc = self
            .build()
            .map_err(|e| EncodeError::bad_api_usage(e.to_string()))?;

        if !(1..=super::outer::HS_DESC_LIFETIME_MAX_MINUTES).contains(&hs_desc.lifetime) {
            return Err(EncodeError::bad_api_usage("descriptor lifetime out of range"));
        }

        // Construct the inner plaintext.  This is the unencrypted value of
        // the "encrypted" field.
        let inner_plaintext = inner::HsDescInner {
            hs_desc_sign: hs_desc.hs_desc_sign,
            create2_formats: hs_desc.create2_formats,
            auth_required: hs_desc.auth_required.as_ref(),
            intro_points: hs_desc.intro_points,
            intro_auth_key_cert_expiry: hs_desc.intro_auth_key_cert_expiry,
            intro_enc_key_cert_expiry: hs_desc.intro_enc_key_cert_expiry,
            now: hs_desc.now,
        }
        .build_sign(rng)?;

        // Before encryption, pad the plaintext to the alignment quantum,
        // so that its length leaks as little as possible.
        let mut plaintext = inner_plaintext.into_bytes();
        desc_enc::pad_with_zero_to_align(&mut plaintext);

        // Encrypt the inner document.
        let blinded_id = hs_desc.blinded_id.public().id();
        let encrypted = HsDescEncryption {
            blinded_id: &blinded_id,
            subcredential: hs_desc.subcredential.as_ref(),
            string_const: HS_DESC_ENCRYPTION_STRING_CONST,
        }
        .encrypt(rng, &plaintext);

        // The descriptor signing key is certified by the blinded identity.
        let hs_desc_sign_cert = Ed25519Cert::constructor()
            .cert_type(CertType::HS_BLINDED_ID_V_SIGNING)
            .expiration(hs_desc.hs_desc_sign_cert_expiry)
            .signing_key(Ed25519Identity::from(hs_desc.blinded_id.public().as_ref()))
            .cert_key(CertifiedKey::Ed25519(
                hs_desc.hs_desc_sign.verifying_key().into(),
            ))
            .encode_and_sign(hs_desc.blinded_id.as_expanded(), hs_desc.now)
            .map_err(|e| EncodeError::bad_api_usage(e.to_string()))?;

        // Finally, build the whole descriptor.
        outer::HsDescOuter {
            hs_desc_sign: hs_desc.hs_desc_sign,
            hs_desc_sign_cert,
            lifetime: hs_desc.lifetime,
            revision_counter: hs_desc.revision_counter,
            encrypted,
        }
        .build_sign(rng)
    }
}
