//! Enveloped XML-DSig signer for DPS and event documents.
//!
//! Profile fixed by the national layout: Canonical XML 1.0 without comments,
//! RSA-SHA1 signature, SHA-1 digest, transforms enveloped-signature + C14N,
//! one reference bound to the business element through `#Id`. The
//! `<Signature>` element is appended as the last child of the document root.

use crate::domain::constants::{
    C14N_ALGORITHM, ENVELOPED_SIGNATURE_TRANSFORM, RSA_SHA1_ALGORITHM, SHA1_DIGEST_ALGORITHM,
    XMLDSIG_NS,
};
use crate::domain::credential::KeyMaterial;
use crate::domain::document::{ReferenceTarget, SignedDocument};
use crate::domain::xml::{canonicalize, Document, Node};
use crate::infra::error::{NfseError, NfseResult};
use base64::Engine;
use openssl::hash::{hash, MessageDigest};
use openssl::pkey::PKey;
use openssl::sign::Signer;

/// Produces the content of `<KeyInfo>`.
///
/// The exchange wants only the leaf certificate; other profiles can plug in
/// a different shape without touching the signer.
pub trait KeyInfoStrategy: Send + Sync {
    fn key_info_content(&self, key_material: &KeyMaterial) -> NfseResult<String>;
}

/// `<X509Data><X509Certificate>…</X509Certificate></X509Data>` with the
/// bare base64 DER of the signing certificate.
#[derive(Debug, Default, Clone, Copy)]
pub struct X509CertificateKeyInfo;

impl KeyInfoStrategy for X509CertificateKeyInfo {
    fn key_info_content(&self, key_material: &KeyMaterial) -> NfseResult<String> {
        let cert_b64 = key_material
            .certificate_base64()
            .ok_or_else(|| NfseError::SigningError("certificate PEM has no body".into()))?;
        Ok(format!(
            "<X509Data><X509Certificate>{cert_b64}</X509Certificate></X509Data>"
        ))
    }
}

/// Signs rendered XML with a credential's RSA key.
pub struct XmlSigner {
    key_info: Box<dyn KeyInfoStrategy>,
}

impl Default for XmlSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlSigner {
    #[must_use]
    pub fn new() -> Self {
        Self::with_key_info(X509CertificateKeyInfo)
    }

    #[must_use]
    pub fn with_key_info(strategy: impl KeyInfoStrategy + 'static) -> Self {
        Self {
            key_info: Box::new(strategy),
        }
    }

    /// Sign `xml`, covering the first element named `target.local_name`.
    ///
    /// The reference URI is always `#` plus the element's `Id` attribute. An
    /// empty `target.id` adopts that attribute; a non-empty one must equal it.
    ///
    /// Every failure (malformed XML, missing element, bad key, OpenSSL error)
    /// comes back as [`NfseError::SigningError`].
    pub fn sign(
        &self,
        xml: &str,
        target: &ReferenceTarget,
        key_material: &KeyMaterial,
    ) -> NfseResult<SignedDocument> {
        self.sign_inner(xml, target, key_material).map_err(|e| match e {
            NfseError::SigningError(_) => e,
            other => NfseError::SigningError(other.to_string()),
        })
    }

    fn sign_inner(
        &self,
        xml: &str,
        target: &ReferenceTarget,
        key_material: &KeyMaterial,
    ) -> NfseResult<SignedDocument> {
        let pkey = PKey::private_key_from_pem(key_material.private_key_pem().as_bytes())?;
        if pkey.rsa().is_err() {
            return Err(NfseError::SigningError(
                "RSA-SHA1 profile requires an RSA private key".into(),
            ));
        }

        let doc = Document::parse(xml)?;
        let path = doc
            .find_first(|e| e.local_name() == target.local_name)
            .ok_or_else(|| {
                NfseError::SigningError(format!("element <{}> not found", target.local_name))
            })?;
        let element_id = doc
            .element_at(&path)
            .and_then(|element| element.attribute("Id"))
            .map(str::to_string);
        let target = bind_reference(target, element_id.as_deref())?;

        let canonical = canonicalize(&doc, &path, None)
            .ok_or_else(|| NfseError::SigningError("reference element vanished".into()))?;
        let digest = b64(&hash(MessageDigest::sha1(), canonical.as_bytes())?);
        log::debug!(
            "Reference {} canonical length {} digest {digest}",
            target.uri(),
            canonical.len()
        );

        let signed_info = signed_info(&target.uri(), &digest);
        let key_info = self.key_info.key_info_content(key_material)?;

        // SignedInfo is canonicalized in its final position so inherited
        // namespaces from the document root are part of what gets signed.
        let placeholder = insert_into_root(
            xml,
            &doc.root.name,
            &signature_xml(&signed_info, "", &key_info),
        )?;
        let placed = Document::parse(&placeholder)?;
        let signature_path = last_child_path(&placed, "Signature")
            .ok_or_else(|| NfseError::SigningError("signature placement failed".into()))?;
        let signed_info_path = child_path(&placed, &signature_path, "SignedInfo")
            .ok_or_else(|| NfseError::SigningError("signature placement failed".into()))?;
        let canonical_signed_info = canonicalize(&placed, &signed_info_path, None)
            .ok_or_else(|| NfseError::SigningError("signature placement failed".into()))?;

        let mut signer = Signer::new(MessageDigest::sha1(), &pkey)?;
        signer.update(canonical_signed_info.as_bytes())?;
        let signature_value = b64(&signer.sign_to_vec()?);

        let signed = insert_into_root(
            xml,
            &doc.root.name,
            &signature_xml(&signed_info, &signature_value, &key_info),
        )?;
        log::info!("Signed <{}> {}", target.local_name, target.uri());
        Ok(SignedDocument::new(signed))
    }
}

/// Resolve the reference against the `Id` the element actually carries.
fn bind_reference(
    target: &ReferenceTarget,
    element_id: Option<&str>,
) -> NfseResult<ReferenceTarget> {
    match element_id {
        Some(id) if !id.is_empty() && (target.id.is_empty() || target.id == id) => {
            Ok(ReferenceTarget::new(target.local_name.clone(), id))
        }
        Some(id) if !id.is_empty() => Err(NfseError::SigningError(format!(
            "reference id {} does not match Id {id} of <{}>",
            target.id, target.local_name
        ))),
        _ => Err(NfseError::SigningError(format!(
            "<{}> has no Id attribute to reference",
            target.local_name
        ))),
    }
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn signed_info(reference_uri: &str, digest: &str) -> String {
    format!(
        concat!(
            "<SignedInfo>",
            "<CanonicalizationMethod Algorithm=\"{c14n}\"></CanonicalizationMethod>",
            "<SignatureMethod Algorithm=\"{sig}\"></SignatureMethod>",
            "<Reference URI=\"{uri}\">",
            "<Transforms>",
            "<Transform Algorithm=\"{env}\"></Transform>",
            "<Transform Algorithm=\"{c14n}\"></Transform>",
            "</Transforms>",
            "<DigestMethod Algorithm=\"{dig}\"></DigestMethod>",
            "<DigestValue>{digest}</DigestValue>",
            "</Reference>",
            "</SignedInfo>"
        ),
        c14n = C14N_ALGORITHM,
        sig = RSA_SHA1_ALGORITHM,
        env = ENVELOPED_SIGNATURE_TRANSFORM,
        dig = SHA1_DIGEST_ALGORITHM,
        uri = escape_attr(reference_uri),
        digest = digest,
    )
}

fn signature_xml(signed_info: &str, signature_value: &str, key_info: &str) -> String {
    format!(
        "<Signature xmlns=\"{XMLDSIG_NS}\">{signed_info}<SignatureValue>{signature_value}</SignatureValue><KeyInfo>{key_info}</KeyInfo></Signature>"
    )
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

/// Insert `fragment` right before the closing tag of the root element,
/// leaving every other byte of the document untouched.
fn insert_into_root(xml: &str, root_name: &str, fragment: &str) -> NfseResult<String> {
    let trimmed = xml.trim_end();
    let close_at = trimmed
        .rfind("</")
        .ok_or_else(|| NfseError::SigningError("root element has no closing tag".into()))?;
    let closing = trimmed[close_at + 2..].trim_end_matches('>').trim_end();
    if closing != root_name || !trimmed.ends_with('>') {
        return Err(NfseError::SigningError(format!(
            "expected </{root_name}> at end of document"
        )));
    }
    let mut out = String::with_capacity(xml.len() + fragment.len());
    out.push_str(&xml[..close_at]);
    out.push_str(fragment);
    out.push_str(&xml[close_at..]);
    Ok(out)
}

fn last_child_path(doc: &Document, local_name: &str) -> Option<Vec<usize>> {
    doc.root
        .children
        .iter()
        .enumerate()
        .rev()
        .find_map(|(idx, node)| match node {
            Node::Element(e) if e.local_name() == local_name => Some(vec![idx]),
            _ => None,
        })
}

/// Path of the first child element of `parent` with `local_name`.
pub(crate) fn child_path(doc: &Document, parent: &[usize], local_name: &str) -> Option<Vec<usize>> {
    let element = doc.element_at(parent)?;
    element
        .children
        .iter()
        .position(|node| {
            matches!(node, Node::Element(e) if e.local_name() == local_name)
        })
        .map(|idx| {
            let mut path = parent.to_vec();
            path.push(idx);
            path
        })
}
