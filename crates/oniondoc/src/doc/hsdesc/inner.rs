//! Parsing for the inner (encrypted) document of an onion service
//! descriptor.

use std::time::SystemTime;

use super::{IntroAuthType, IntroEncKey, IntroPointDesc};
use crate::linkspec::{LinkSpec, LinkSpecType};
use crate::parse::keyword::Keyword as _;
use crate::parse::parser::{KeywordRule as _, SectionRules};
use crate::parse::tokenize::{Item, NetDocReader};
use crate::types::misc::{DecimalUint, RsaPublic, UnvalidatedEdCert, B64, RSA_FIXED_EXPONENT};
use crate::{Error, NetdocErrorKind as EK, Result};

use once_cell::sync::Lazy;
use smallvec::SmallVec;
use oniondoc_cert::rsa::RsaCrosscert;
use oniondoc_hscrypto::pk::{HsIntroAuthKey, HsIntroEncKey};
use oniondoc_llcrypto::pk::ed25519::Ed25519Identity;
use oniondoc_llcrypto::pk::keymanip::convert_curve25519_to_ed25519_public;
use oniondoc_llcrypto::pk::{curve25519, ed25519, ValidatableSignature};

/// The contents of the inner document of an onion service descriptor.
#[derive(Debug, Clone)]
pub(super) struct HsDescInner {
    /// The create-handshake types that this onion service accepts when
    /// a client introduces itself.
    pub(super) create2_formats: Vec<u16>,
    /// The authentication types that this onion service requires when
    /// connecting, if any.
    pub(super) auth_required: Option<SmallVec<[IntroAuthType; 2]>>,
    /// A list of advertised introduction points and their contact info,
    /// in the order in which they appeared.
    pub(super) intro_points: Vec<IntroPointDesc>,
}

/// An error produced while parsing the inner document.
///
/// The distinction between the variants matters to the caller: a record
/// problem condemns the whole descriptor, but is reported differently
/// from a header problem or an unrecognized key algorithm.
#[derive(Debug)]
pub(super) enum InnerError {
    /// Something was wrong at the top of the inner document.
    Header(Error),
    /// A specific introduction-point record was invalid.
    IntroPoint(Error),
    /// An `enc-key` entry named a key algorithm we do not know.
    UnknownEncKeyType,
}

decl_keyword! {
    pub(crate) HsInnerKwd {
        "create2-formats" => CREATE2_FORMATS,
        "authentication-required" => AUTHENTICATION_REQUIRED,
        "introduction-point" => INTRODUCTION_POINT,
        "auth-key" => AUTH_KEY,
        "enc-key" => ENC_KEY,
        "enc-key-certification" => ENC_KEY_CERTIFICATION,
    }
}

/// Rules about how keywords appear in the header part of the inner
/// document.
static HS_INNER_HEADER_RULES: Lazy<SectionRules<HsInnerKwd>> = Lazy::new(|| {
    use HsInnerKwd::*;

    let mut rules = SectionRules::builder();
    rules.add(CREATE2_FORMATS.rule().required().args(1..));
    rules.add(AUTHENTICATION_REQUIRED.rule().args(1..));

    rules.build()
});

/// Rules about how keywords appear in each introduction-point section of
/// the inner document.
static HS_INNER_INTRO_RULES: Lazy<SectionRules<HsInnerKwd>> = Lazy::new(|| {
    use HsInnerKwd::*;

    let mut rules = SectionRules::builder();
    rules.add(INTRODUCTION_POINT.rule().required().args(1..=1));
    rules.add(AUTH_KEY.rule().required().args(0..=0).obj_required());
    rules.add(ENC_KEY.rule().required().args(1..=2).obj_optional());
    rules.add(
        ENC_KEY_CERTIFICATION
            .rule()
            .required()
            .args(0..=0)
            .obj_required(),
    );

    rules.build()
});

/// The exact sequence of keywords an introduction-point record must
/// consist of.
static HS_INNER_INTRO_SEQUENCE: &[HsInnerKwd] = &[
    HsInnerKwd::INTRODUCTION_POINT,
    HsInnerKwd::AUTH_KEY,
    HsInnerKwd::ENC_KEY,
    HsInnerKwd::ENC_KEY_CERTIFICATION,
];

/// Information about one of the Ed25519 certificates inside the inner
/// document.
///
/// This is a temporary structure that we use when parsing.
struct InnerCertData {
    /// The identity of the key that purportedly signs this certificate.
    signing_key: Ed25519Identity,
    /// The key that is being signed.
    subject_key: ed25519::PublicKey,
    /// A detached signature object that we must validate before we can
    /// conclude that the certificate is valid.
    signature: Box<dyn ValidatableSignature>,
    /// The time when the certificate expires.
    expiry: SystemTime,
}

/// Decode a certificate from `tok`, and check that its tag and type are
/// expected, that it contains a signing key, and that both signing and
/// subject keys are Ed25519.
///
/// On success, return an InnerCertData.
fn handle_inner_certificate(
    tok: &Item<'_, HsInnerKwd>,
    want_tag: &str,
    want_type: oniondoc_cert::CertType,
) -> Result<InnerCertData> {
    let make_err = |e, msg| {
        EK::BadCertificate
            .with_msg(msg)
            .with_source(e)
            .at_pos(tok.pos())
    };

    let cert = tok
        .parse_obj::<UnvalidatedEdCert>(want_tag)?
        .check_cert_type(want_type)?
        .into_unchecked();

    // These certs have to include a signing key.
    let cert = cert
        .should_have_signing_key()
        .map_err(|e| make_err(e, "Certificate was not self-contained"))?;

    let subject_key = cert
        .peek_subject_key()
        .as_ed25519()
        .and_then(|id| id.try_into().ok())
        .ok_or_else(|| {
            EK::BadCertificate
                .with_msg("Certified key was not valid Ed25519")
                .at_pos(tok.pos())
        })?;
    let signing_key = *cert.peek_signing_key();

    // Peel off the signature and the expiration.
    let (cert, signature) = cert
        .dangerously_split()
        .map_err(|e| make_err(e, "Certificate was not Ed25519-signed"))?;
    let signature = Box::new(signature);
    let expiry = cert.dangerously_assume_timely().expiry();

    Ok(InnerCertData {
        signing_key,
        subject_key,
        signature,
        expiry,
    })
}

impl HsDescInner {
    /// Attempt to parse the inner document of an onion service descriptor
    /// from a provided string.
    ///
    /// The `blinded_id` is the identity the enclosing descriptor was
    /// published under; legacy cross-certificates must name it as their
    /// subject.
    ///
    /// On success, return the signing key that was used for every
    /// certificate in the inner document, the document itself, the
    /// signatures that remain to be checked, and the earliest expiration
    /// time of any embedded certificate.
    #[allow(clippy::type_complexity)]
    pub(super) fn parse(
        s: &str,
        blinded_id: &Ed25519Identity,
    ) -> std::result::Result<
        (
            Option<Ed25519Identity>,
            HsDescInner,
            Vec<Box<dyn ValidatableSignature>>,
            Option<SystemTime>,
        ),
        InnerError,
    > {
        let reader: NetDocReader<'_, HsInnerKwd> = NetDocReader::new(s);

        // Split the items into a header and one batch per
        // `introduction-point` entry.  A tokenizer error is attributed to
        // the region in which it occurs.
        let mut sections: Vec<Vec<Result<Item<'_, HsInnerKwd>>>> = vec![Vec::new()];
        for item in reader {
            let starts_record = matches!(&item, Ok(i) if i.kwd() == HsInnerKwd::INTRODUCTION_POINT);
            if starts_record {
                sections.push(Vec::new());
            }
            // There is always a last section: we start with one.
            #[allow(clippy::unwrap_used)]
            sections.last_mut().unwrap().push(item);
        }
        let mut sections = sections.into_iter();
        // (`next` cannot fail: see above.)
        #[allow(clippy::unwrap_used)]
        let header_items = sections.next().unwrap();

        // Parse the header.
        let header = HS_INNER_HEADER_RULES
            .parse(header_items.into_iter())
            .map_err(|e| InnerError::Header(e.within(s)))?;

        // Accept any non-empty list of create-handshake identifiers.
        // (Which of them a client is able to use is the caller's affair.)
        let create2_formats = {
            let tok = header
                .required(HsInnerKwd::CREATE2_FORMATS)
                .map_err(InnerError::Header)?;
            let mut formats = Vec::new();
            for (idx, _) in tok.args().enumerate() {
                let fmt = tok
                    .parse_arg::<DecimalUint<u16>>(idx)
                    .map_err(|e| InnerError::Header(e.within(s)))?
                    .0;
                formats.push(fmt);
            }
            formats
        };

        // Check whether any kind of introduction authentication is
        // required by an `authentication-required` line.
        let auth_required = if let Some(tok) = header.get(HsInnerKwd::AUTHENTICATION_REQUIRED) {
            let mut auth_types: SmallVec<[IntroAuthType; 2]> = SmallVec::new();
            let mut push = |at| {
                if !auth_types.contains(&at) {
                    auth_types.push(at);
                }
            };
            for arg in tok.args() {
                #[allow(clippy::single_match)]
                match arg {
                    "ed25519" => push(IntroAuthType::Ed25519),
                    _ => (), // Ignore unrecognized types.
                }
            }
            // .. but if no types are recognized, we can't connect.
            if auth_types.is_empty() {
                return Err(InnerError::Header(
                    EK::BadArgument
                        .at_pos(tok.pos())
                        .with_msg("No recognized authentication methods.")
                        .within(s),
                ));
            }

            Some(auth_types)
        } else {
            None
        };

        // Now we parse the introduction points.  Each of these is a
        // section starting with `introduction-point`, ending right before
        // the next one (or at the end of the document).
        let mut signatures: Vec<Box<dyn ValidatableSignature>> = Vec::new();
        let mut expirations = Vec::new();
        let mut cert_signing_key: Option<Ed25519Identity> = None;
        let mut intro_points = Vec::new();
        for ipt_items in sections {
            let ipt = Self::take_intro_point(
                ipt_items,
                blinded_id,
                &mut signatures,
                &mut expirations,
                &mut cert_signing_key,
            )
            .map_err(|e| match e {
                InnerError::IntroPoint(e) => InnerError::IntroPoint(e.within(s)),
                other => other,
            })?;
            intro_points.push(ipt);
        }

        let inner = HsDescInner {
            create2_formats,
            auth_required,
            intro_points,
        };
        let expiry = expirations.iter().min().copied();
        Ok((cert_signing_key, inner, signatures, expiry))
    }

    /// Parse a single introduction-point record from `items`.
    ///
    /// Signatures and expirations of embedded certificates are pushed onto
    /// `signatures` and `expirations`; the signing key seen on every
    /// Ed25519 certificate must agree, and is accumulated in
    /// `cert_signing_key`.
    fn take_intro_point(
        items: Vec<Result<Item<'_, HsInnerKwd>>>,
        blinded_id: &Ed25519Identity,
        signatures: &mut Vec<Box<dyn ValidatableSignature>>,
        expirations: &mut Vec<SystemTime>,
        cert_signing_key: &mut Option<Ed25519Identity>,
    ) -> std::result::Result<IntroPointDesc, InnerError> {
        use HsInnerKwd::*;

        let ipt_section = HS_INNER_INTRO_RULES
            .parse(items.into_iter())
            .map_err(InnerError::IntroPoint)?;
        ipt_section
            .check_exact_sequence(HS_INNER_INTRO_SEQUENCE)
            .map_err(InnerError::IntroPoint)?;

        // Helper: check an Ed25519 certificate against the accumulated
        // signing key, and record its signature and expiry.
        let mut handle_cert =
            |data: InnerCertData| -> std::result::Result<ed25519::PublicKey, Error> {
                let InnerCertData {
                    signing_key,
                    subject_key,
                    signature,
                    expiry,
                } = data;
                expirations.push(expiry);
                signatures.push(signature);
                if cert_signing_key.get_or_insert(signing_key) != &signing_key {
                    return Err(EK::BadCertificate.with_msg("Mismatched signing key"));
                }
                Ok(subject_key)
            };

        // Parse the link specifiers.
        let link_specifiers =
            Self::take_link_specifiers(ipt_section.required(INTRODUCTION_POINT).map_err(InnerError::IntroPoint)?)
                .map_err(InnerError::IntroPoint)?;

        // Extract the authentication key from the (unchecked) "auth-key"
        // certificate.
        let auth_key: HsIntroAuthKey = {
            let tok = ipt_section.required(AUTH_KEY).map_err(InnerError::IntroPoint)?;
            let data = handle_inner_certificate(
                tok,
                "ED25519 CERT",
                oniondoc_cert::CertType::HS_IP_V_SIGNING,
            )
            .map_err(InnerError::IntroPoint)?;
            handle_cert(data).map_err(InnerError::IntroPoint)?.into()
        };

        // Extract the encryption key from the "enc-key" entry.
        let enc_key_tok = ipt_section.required(ENC_KEY).map_err(InnerError::IntroPoint)?;
        let cert_tok = ipt_section
            .required(ENC_KEY_CERTIFICATION)
            .map_err(InnerError::IntroPoint)?;
        let enc_key = match enc_key_tok.arg(0) {
            Some("ntor") => {
                // `enc-key ntor <base64 curve25519 key>`, certified by a
                // certificate whose subject is the same key converted to
                // ed25519.
                let key = enc_key_tok
                    .parse_arg::<B64>(1)
                    .and_then(|b| b.into_array())
                    .map_err(InnerError::IntroPoint)?;
                if enc_key_tok.has_obj() {
                    return Err(InnerError::IntroPoint(
                        EK::UnexpectedObject
                            .with_msg(ENC_KEY.to_str())
                            .at_pos(enc_key_tok.pos()),
                    ));
                }
                let svc_enc_key = curve25519::PublicKey::from(key);

                let data = handle_inner_certificate(
                    cert_tok,
                    "ED25519 CERT",
                    oniondoc_cert::CertType::HS_IP_CC_SIGNING,
                )
                .map_err(InnerError::IntroPoint)?;
                let subject_key = handle_cert(data).map_err(InnerError::IntroPoint)?;

                // The sign bit is always zero here.  That would give a 50%
                // chance of making the converted key unusable for
                // verification; but the certificate's own signature is made
                // with the descriptor signing key, so nothing is ever
                // verified with the subject.
                let sign_bit = 0;
                let expected_ed_key =
                    convert_curve25519_to_ed25519_public(&svc_enc_key, sign_bit);
                if expected_ed_key != Some(subject_key) {
                    return Err(InnerError::IntroPoint(
                        EK::BadCertificate
                            .at_pos(cert_tok.pos())
                            .with_msg("Mismatched subject key"),
                    ));
                }

                IntroEncKey::Ntor(HsIntroEncKey::from(svc_enc_key))
            }
            Some("legacy") => {
                // `enc-key legacy` carries an RSA public key as its
                // object, and is certified by a CROSSCERT signed with that
                // key, naming the blinded identity as its subject.
                if enc_key_tok.n_args() != 1 {
                    return Err(InnerError::IntroPoint(
                        EK::TooManyArguments
                            .with_msg(ENC_KEY.to_str())
                            .at_pos(enc_key_tok.pos()),
                    ));
                }
                let key: oniondoc_llcrypto::pk::rsa::PublicKey = enc_key_tok
                    .parse_obj::<RsaPublic>("RSA PUBLIC KEY")
                    .and_then(|k| k.check_exponent(RSA_FIXED_EXPONENT))
                    .and_then(|k| k.check_len_eq(1024))
                    .map_err(InnerError::IntroPoint)?
                    .into();

                let crosscert_bytes = cert_tok.obj("CROSSCERT").map_err(InnerError::IntroPoint)?;
                let crosscert = RsaCrosscert::decode(&crosscert_bytes[..])
                    .map_err(|e| {
                        InnerError::IntroPoint(
                            EK::BadCertificate
                                .at_pos(cert_tok.pos())
                                .with_msg("Unparseable cross-certificate")
                                .with_source(e),
                        )
                    })?
                    .check_signature(&key)
                    .map_err(|e| {
                        InnerError::IntroPoint(
                            EK::BadCertificate
                                .at_pos(cert_tok.pos())
                                .with_source(e),
                        )
                    })?;
                if !crosscert.subject_key_matches(blinded_id) {
                    return Err(InnerError::IntroPoint(
                        EK::BadCertificate
                            .at_pos(cert_tok.pos())
                            .with_msg("Cross-certificate subject is not the blinded identity"),
                    ));
                }
                expirations.push(crosscert.expiry());

                IntroEncKey::Legacy {
                    key,
                    crosscert: crosscert_bytes.into(),
                }
            }
            Some(_) => return Err(InnerError::UnknownEncKeyType),
            None => {
                // Unreachable in practice: the section rules require at
                // least one argument.
                return Err(InnerError::IntroPoint(
                    EK::TooFewArguments
                        .with_msg(ENC_KEY.to_str())
                        .at_pos(enc_key_tok.pos()),
                ));
            }
        };

        Ok(IntroPointDesc {
            link_specifiers,
            auth_key,
            enc_key,
        })
    }

    /// Decode and validate the link-specifier list of an
    /// `introduction-point` entry.
    fn take_link_specifiers(tok: &Item<'_, HsInnerKwd>) -> Result<Vec<LinkSpec>> {
        let ls = tok.parse_arg::<B64>(0)?;
        let mut r = oniondoc_bytes::Reader::from_slice(ls.as_bytes());
        let n = r.take_u8().map_err(|e| Error::from(e).at_pos(tok.pos()))?;
        let specs: Vec<LinkSpec> = r
            .extract_n(n.into())
            .map_err(|e| Error::from(e).at_pos(tok.pos()))?;
        r.should_be_exhausted()
            .map_err(|e| Error::from(e).at_pos(tok.pos()))?;

        if specs.is_empty() {
            return Err(EK::MissingEntry
                .at_pos(tok.pos())
                .with_msg("no link specifiers"));
        }
        // No known type may appear twice within one record.
        for known in [
            LinkSpecType::ORPORT_V4,
            LinkSpecType::ORPORT_V6,
            LinkSpecType::RSAID,
        ] {
            if specs.iter().filter(|ls| ls.lstype() == known).count() > 1 {
                return Err(EK::DuplicateToken
                    .at_pos(tok.pos())
                    .with_msg("duplicate link specifier type"));
            }
        }
        Ok(specs)
    }
}
