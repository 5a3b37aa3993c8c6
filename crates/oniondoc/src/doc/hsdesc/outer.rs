//! Parsing for the outer (plaintext) envelope of an onion service
//! descriptor.

use once_cell::sync::Lazy;
use oniondoc_cert::Ed25519Cert;
use oniondoc_hscrypto::pk::HsBlindId;
use oniondoc_hscrypto::RevisionCounter;
use oniondoc_llcrypto::pk::ed25519::{self, Ed25519Identity, ValidatableEd25519Signature};

use crate::parse::parser::{KeywordRule as _, SectionRules};
use crate::parse::tokenize::NetDocReader;
use crate::types::misc::{DecimalUint, UnvalidatedEdCert, B64};
use crate::{NetdocErrorKind as EK, Result};

use std::time::SystemTime;

/// The lowest descriptor version we understand.
pub(super) const HS_DESC_VERSION_MIN: u32 = 3;

/// The highest descriptor version we understand.
pub(super) const HS_DESC_VERSION_MAX: u32 = 3;

/// The text the outer document signature is prefixed with.
pub(super) const HS_DESC_SIGNATURE_PREFIX: &[u8] = b"Tor onion service descriptor sig v3";

/// The longest a descriptor's lifetime may be, in minutes.
pub(super) const HS_DESC_LIFETIME_MAX_MINUTES: u16 = 720;

/// A more-or-less verbatim representation of the outermost plaintext
/// document of an onion service descriptor.
#[derive(Clone, Debug)]
pub(super) struct HsDescOuter {
    /// The lifetime of this descriptor, in minutes.
    ///
    /// This doesn't actually list the starting time or the end time for
    /// the descriptor: presumably, because we didn't want to leak the
    /// onion service's view of the wallclock.
    pub(super) lifetime: u16,
    /// A certificate containing the descriptor-signing-key for this onion
    /// service, signed by its blinded ed25519 identity.
    pub(super) desc_signing_key_cert: Ed25519Cert,
    /// A revision counter to tell whether this descriptor is more or less
    /// recent than another one for the same blinded ID.
    pub(super) revision_counter: RevisionCounter,
    /// The encrypted body of this onion service descriptor.
    pub(super) encrypted: Vec<u8>,
}

impl HsDescOuter {
    /// Return the blinded Id for this onion service descriptor.
    pub(super) fn blinded_id(&self) -> HsBlindId {
        let ident = self
            .desc_signing_key_cert
            .signing_key()
            .expect("signing key was absent!?");
        (*ident).into()
    }

    /// Return the Id of the descriptor-signing key from this onion service
    /// descriptor.
    pub(super) fn desc_sign_key_id(&self) -> &Ed25519Identity {
        self.desc_signing_key_cert
            .subject_key()
            .as_ed25519()
            .expect(
                "Somehow constructed an HsDescOuter with a non-Ed25519 signing key in its cert.",
            )
    }
}

/// An `HsDescOuter` together with the as-yet-unverified signatures that
/// bind it, and the expiration of its signing-key certificate.
#[derive(Debug)]
pub(super) struct UncheckedHsDescOuter {
    /// The parsed outer document.
    pub(super) desc: HsDescOuter,
    /// The signature made by the blinded identity over the signing-key
    /// certificate.
    pub(super) cert_signature: ValidatableEd25519Signature,
    /// The signature made by the descriptor signing key over the document
    /// itself.
    pub(super) doc_signature: ValidatableEd25519Signature,
    /// When the signing-key certificate expires.
    pub(super) cert_expiry: SystemTime,
}

decl_keyword! {
    pub(crate) HsOuterKwd {
        "hs-descriptor" => HS_DESCRIPTOR,
        "descriptor-lifetime" => DESCRIPTOR_LIFETIME,
        "descriptor-signing-key-cert" => DESCRIPTOR_SIGNING_KEY_CERT,
        "revision-counter" => REVISION_COUNTER,
        "encrypted" => ENCRYPTED,
        "signature" => SIGNATURE,
    }
}

/// Rules about how keywords appear in the outer document of an onion
/// service descriptor.
static HS_OUTER_RULES: Lazy<SectionRules<HsOuterKwd>> = Lazy::new(|| {
    use HsOuterKwd::*;

    let mut rules = SectionRules::builder();
    rules.add(HS_DESCRIPTOR.rule().required().args(1..=1));
    rules.add(DESCRIPTOR_LIFETIME.rule().required().args(1..=1));
    rules.add(
        DESCRIPTOR_SIGNING_KEY_CERT
            .rule()
            .required()
            .args(0..=0)
            .obj_required(),
    );
    rules.add(REVISION_COUNTER.rule().required().args(1..=1));
    rules.add(ENCRYPTED.rule().required().args(0..=0).obj_required());
    rules.add(SIGNATURE.rule().required().args(1..=1));

    rules.build()
});

/// The exact sequence of keywords an outer document must consist of.
///
/// Nothing else may appear, and nothing may appear out of place.
static HS_OUTER_SEQUENCE: &[HsOuterKwd] = &[
    HsOuterKwd::HS_DESCRIPTOR,
    HsOuterKwd::DESCRIPTOR_LIFETIME,
    HsOuterKwd::DESCRIPTOR_SIGNING_KEY_CERT,
    HsOuterKwd::REVISION_COUNTER,
    HsOuterKwd::ENCRYPTED,
    HsOuterKwd::SIGNATURE,
];

impl HsDescOuter {
    /// Try to parse an outer document of an onion service descriptor from
    /// a string.
    pub(super) fn parse(s: &str) -> Result<UncheckedHsDescOuter> {
        let mut reader = NetDocReader::new(s);
        let result = HsDescOuter::take_from_reader(&mut reader).map_err(|e| e.within(s))?;
        Ok(result)
    }

    /// Extract an HsDescOuter from a reader.
    ///
    /// The reader must contain a single HsDescOuter; we return an error if
    /// not.
    fn take_from_reader(reader: &mut NetDocReader<'_, HsOuterKwd>) -> Result<UncheckedHsDescOuter> {
        use HsOuterKwd::*;

        let s = reader.str();
        let body = HS_OUTER_RULES.parse(reader.by_ref())?;
        body.check_exact_sequence(HS_OUTER_SEQUENCE)?;

        // Check that the hs-descriptor version is one we understand.
        {
            let tok = body.required(HS_DESCRIPTOR)?;
            let version: u32 = tok.parse_arg::<DecimalUint<u32>>(0)?.0;
            if !(HS_DESC_VERSION_MIN..=HS_DESC_VERSION_MAX).contains(&version) {
                return Err(EK::BadDocumentVersion
                    .with_msg(format!("Unsupported descriptor version {}", version))
                    .at_pos(tok.pos()));
            }
        }

        // Enforce that the document starts and ends with the right
        // keywords, and find the start and end of the signed material.
        let signed_text = {
            let first_item = body
                .first_item()
                .expect("Somehow parsing worked though no keywords were present‽");
            let last_item = body
                .last_item()
                .expect("Somehow parsing worked though no keywords were present‽");
            let start_idx = first_item
                .offset_in(s)
                .expect("Token came from nowhere within the string‽");
            let end_idx = last_item
                .offset_in(s)
                .expect("Token came from nowhere within the string‽");
            // TODO: This way of handling prefixes does a needless
            // allocation.
            let mut signed_text = HS_DESC_SIGNATURE_PREFIX.to_vec();
            signed_text.extend_from_slice(
                s.get(start_idx..end_idx)
                    .expect("Somehow the first item came after the last‽")
                    .as_bytes(),
            );
            signed_text
        };

        // Parse `descriptor-lifetime`.
        let lifetime: u16 = {
            let tok = body.required(DESCRIPTOR_LIFETIME)?;
            let lifetime_minutes = tok.parse_arg::<DecimalUint<u16>>(0)?.0;
            if !(1..=HS_DESC_LIFETIME_MAX_MINUTES).contains(&lifetime_minutes) {
                return Err(EK::BadArgument
                    .with_msg(format!("Invalid descriptor lifetime {}", lifetime_minutes))
                    .at_pos(tok.pos()));
            }
            lifetime_minutes
        };

        // Parse `descriptor-signing-key-cert`.  This certificate is signed
        // with the blinded identity, and used to authenticate the
        // descriptor signing key.
        let (unchecked_cert, kp_desc_sign) = {
            let cert_tok = body.required(DESCRIPTOR_SIGNING_KEY_CERT)?;
            let cert = cert_tok
                .parse_obj::<UnvalidatedEdCert>("ED25519 CERT")?
                .check_cert_type(oniondoc_cert::CertType::HS_BLINDED_ID_V_SIGNING)?
                .into_unchecked()
                .should_have_signing_key()
                .map_err(|err| {
                    EK::BadCertificate
                        .err()
                        .with_source(err)
                        .at_pos(cert_tok.pos())
                })?;
            let kp_desc_sign: ed25519::PublicKey = cert
                .peek_subject_key()
                .as_ed25519()
                .and_then(|id| id.try_into().ok())
                .ok_or_else(|| {
                    EK::BadCertificate
                        .err()
                        .with_msg("Invalid ed25519 subject key")
                        .at_pos(cert_tok.pos())
                })?;
            (cert, kp_desc_sign)
        };

        // Parse remaining fields, which are nice and simple.
        let revision_counter = body
            .required(REVISION_COUNTER)?
            .parse_arg::<DecimalUint<u64>>(0)?
            .0
            .into();
        let encrypted_body: Vec<u8> = body.required(ENCRYPTED)?.obj("MESSAGE")?;
        let signature = body
            .required(SIGNATURE)?
            .parse_arg::<B64>(0)?
            .into_array()
            .map_err(|_| EK::BadSignature.with_msg("Bad signature object length"))?;
        let signature = ed25519::Signature::from_bytes(&signature);

        // Split apart the unchecked `descriptor-signing-key-cert`:
        // its constraints will become our own.
        let (sig_checked_cert, cert_signature) = unchecked_cert
            .dangerously_split()
            // we already checked that there is a public key, so an error
            // should be impossible.
            .map_err(|e| EK::Internal.err().with_source(e))?;
        let desc_signing_key_cert = sig_checked_cert.dangerously_assume_timely();
        let cert_expiry = desc_signing_key_cert.expiry();

        let desc = HsDescOuter {
            lifetime,
            desc_signing_key_cert,
            revision_counter,
            encrypted: encrypted_body,
        };
        let doc_signature = ValidatableEd25519Signature::new(kp_desc_sign, signature, &signed_text);
        Ok(UncheckedHsDescOuter {
            desc,
            cert_signature,
            doc_signature,
            cert_expiry,
        })
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::NetdocErrorKind as EK;

    #[test]
    fn not_a_descriptor() {
        let err = HsDescOuter::parse("hladfjlkjadf").unwrap_err();
        assert_eq!(err.netdoc_error_kind(), EK::TruncatedLine);

        let err = HsDescOuter::parse("hello-world 1\n").unwrap_err();
        assert_eq!(err.netdoc_error_kind(), EK::UnexpectedToken);
    }

    // (Well-formed outer documents are exercised end-to-end in the
    // round-trip tests of the parent module, which build them with real
    // keys.)
    #[test]
    fn version_gate_applies_before_signature() {
        // A descriptor with an unsupported version is rejected during
        // parsing, even though its signature is nonsense.
        let s = "\
hs-descriptor 42
descriptor-lifetime 180
descriptor-signing-key-cert
-----BEGIN ED25519 CERT-----
AAEC
-----END ED25519 CERT-----
revision-counter 1
encrypted
-----BEGIN MESSAGE-----
AAEC
-----END MESSAGE-----
signature AAAA
";
        let err = HsDescOuter::parse(s).unwrap_err();
        assert_eq!(err.netdoc_error_kind(), EK::BadDocumentVersion);
    }
}
