//! Verification of enveloped signatures produced by [`XmlSigner`].
//!
//! Only the profile the signer emits is accepted: C14N 1.0, RSA-SHA1,
//! SHA-1 digest and a single reference. Anything else is reported as
//! unsupported instead of being half-checked.
//!
//! [`XmlSigner`]: crate::services::xml_signer::XmlSigner

use crate::domain::constants::{
    C14N_ALGORITHM, ENVELOPED_SIGNATURE_TRANSFORM, RSA_SHA1_ALGORITHM, SHA1_DIGEST_ALGORITHM,
    XMLDSIG_NS,
};
use crate::domain::verification::VerificationReport;
use crate::domain::xml::{canonicalize, Document, Element};
use crate::infra::error::{NfseError, NfseResult};
use crate::services::xml_signer::child_path;
use base64::Engine;
use openssl::hash::{hash, MessageDigest};
use openssl::sign::Verifier;
use openssl::x509::X509;

#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Check the reference digest and the signature value of `xml`.
    ///
    /// Structural problems (no signature, unsupported algorithms, broken
    /// base64) are errors; a digest or signature mismatch is reported in
    /// the returned [`VerificationReport`].
    pub fn verify(&self, xml: &str) -> NfseResult<VerificationReport> {
        let doc = Document::parse(xml)?;
        let signature_path = doc
            .find_first(|e| e.local_name() == "Signature")
            .filter(|path| doc.namespace_of(path) == XMLDSIG_NS)
            .ok_or_else(|| NfseError::InvalidInput("document has no XML signature".into()))?;
        let signed_info_path = child_path(&doc, &signature_path, "SignedInfo")
            .ok_or_else(|| NfseError::InvalidInput("signature has no SignedInfo".into()))?;

        let signature = doc
            .element_at(&signature_path)
            .ok_or_else(|| NfseError::InvalidInput("signature vanished".into()))?;
        let signed_info = doc
            .element_at(&signed_info_path)
            .ok_or_else(|| NfseError::InvalidInput("SignedInfo vanished".into()))?;

        check_algorithm(signed_info.child("CanonicalizationMethod"), C14N_ALGORITHM)?;
        check_algorithm(signed_info.child("SignatureMethod"), RSA_SHA1_ALGORITHM)?;

        let mut references = signed_info
            .child_elements()
            .filter(|e| e.local_name() == "Reference");
        let reference = references
            .next()
            .ok_or_else(|| NfseError::InvalidInput("SignedInfo has no Reference".into()))?;
        if references.next().is_some() {
            return Err(NfseError::InvalidInput(
                "multiple references are not supported".into(),
            ));
        }
        check_algorithm(reference.child("DigestMethod"), SHA1_DIGEST_ALGORITHM)?;
        check_transforms(reference)?;

        let uri = reference.attribute("URI").unwrap_or_default().to_string();
        let expected_digest = strip_ws(
            &reference
                .child("DigestValue")
                .map(Element::text)
                .unwrap_or_default(),
        );
        let signature_value = decode_b64(
            &signature
                .child("SignatureValue")
                .map(Element::text)
                .unwrap_or_default(),
            "SignatureValue",
        )?;
        let certificate = signature
            .child("KeyInfo")
            .and_then(|k| k.child("X509Data"))
            .and_then(|d| d.child("X509Certificate"))
            .map(Element::text)
            .ok_or_else(|| NfseError::InvalidInput("KeyInfo carries no X509Certificate".into()))?;
        let certificate = X509::from_der(&decode_b64(&certificate, "X509Certificate")?)?;

        let target_path = match uri.strip_prefix('#') {
            Some(id) => doc.find_first(|e| {
                ["Id", "ID", "id"]
                    .iter()
                    .any(|attr| e.attribute(attr) == Some(id))
            }),
            None if uri.is_empty() => Some(Vec::new()),
            None => {
                return Err(NfseError::InvalidInput(format!(
                    "unsupported reference URI {uri}"
                )))
            }
        };

        let Some(target_path) = target_path else {
            log::warn!("Reference {uri} not found in document");
            return Ok(VerificationReport::new(uri, false, false, false));
        };

        let exclude = signature_path
            .starts_with(&target_path)
            .then_some(signature_path.as_slice());
        let canonical = canonicalize(&doc, &target_path, exclude)
            .ok_or_else(|| NfseError::InvalidInput("reference element vanished".into()))?;
        let digest = base64::engine::general_purpose::STANDARD
            .encode(hash(MessageDigest::sha1(), canonical.as_bytes())?);
        let digest_ok = digest == expected_digest;

        let canonical_signed_info = canonicalize(&doc, &signed_info_path, None)
            .ok_or_else(|| NfseError::InvalidInput("SignedInfo vanished".into()))?;
        let public_key = certificate.public_key()?;
        let mut verifier = Verifier::new(MessageDigest::sha1(), &public_key)?;
        verifier.update(canonical_signed_info.as_bytes())?;
        // OpenSSL reports a malformed signature blob as an error stack; treat
        // it as a failed check.
        let signature_ok = verifier.verify(&signature_value).unwrap_or(false);

        log::debug!("Verified {uri}: digest_ok={digest_ok} signature_ok={signature_ok}");
        Ok(VerificationReport::new(uri, true, digest_ok, signature_ok))
    }
}

fn check_algorithm(element: Option<&Element>, expected: &str) -> NfseResult<()> {
    let found = element.and_then(|e| e.attribute("Algorithm"));
    if found == Some(expected) {
        Ok(())
    } else {
        Err(NfseError::InvalidInput(format!(
            "unsupported algorithm {}, expected {expected}",
            found.unwrap_or("(none)")
        )))
    }
}

fn check_transforms(reference: &Element) -> NfseResult<()> {
    let Some(transforms) = reference.child("Transforms") else {
        return Ok(());
    };
    for transform in transforms.child_elements() {
        match transform.attribute("Algorithm") {
            Some(ENVELOPED_SIGNATURE_TRANSFORM) | Some(C14N_ALGORITHM) => {}
            other => {
                return Err(NfseError::InvalidInput(format!(
                    "unsupported transform {}",
                    other.unwrap_or("(none)")
                )))
            }
        }
    }
    Ok(())
}

fn strip_ws(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

fn decode_b64(value: &str, what: &str) -> NfseResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(strip_ws(value))
        .map_err(|e| NfseError::InvalidInput(format!("{what} is not valid base64: {e}")))
}
