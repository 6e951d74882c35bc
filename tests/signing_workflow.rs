//! Credential loading, signing and verification end to end.

mod common;

use common::{TestCredential, DPS_ID, PASSWORD};
use nfse_national::{
    CertificateStore, CredentialInput, NfseError, ReferenceTarget, SignatureVerifier, XmlSigner,
};

const DPS: &str = r#"<DPS xmlns="http://www.sped.fazenda.gov.br/nfse" versao="1.00"><infDPS Id="DPS330455723802754300017500900000000000000001"><tpAmb>2</tpAmb><serv><xDescServ>Consultoria &amp; suporte</xDescServ></serv></infDPS></DPS>"#;

fn sign_with(store: &CertificateStore) -> String {
    let km = store.require_key_material().expect("credential should parse");
    XmlSigner::new()
        .sign(DPS, &ReferenceTarget::new("infDPS", DPS_ID), km)
        .expect("signing should succeed")
        .into_string()
}

#[test]
fn pkcs12_file_signs_and_verifies() {
    let credential = TestCredential::new("PKCS12 Prestador");
    let store = CertificateStore::new(
        Some(CredentialInput::Path(credential.pfx_path.clone())),
        Some(PASSWORD.to_string()),
    );

    let signed = sign_with(&store);
    assert!(signed.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(signed.contains(&format!(
        "<X509Certificate>{}</X509Certificate>",
        credential.certificate_base64()
    )));

    let report = SignatureVerifier::new().verify(&signed).unwrap();
    assert!(report.success(), "{report:?}");
    assert_eq!(report.reference_uri, format!("#{DPS_ID}"));
}

#[test]
fn pem_bundle_text_and_file_agree() {
    let credential = TestCredential::new("PEM Prestador");
    let from_text = CertificateStore::new(
        Some(CredentialInput::from_str_lossy(&credential.pem_bundle)),
        None,
    );
    let from_file = CertificateStore::new(
        Some(CredentialInput::from_str_lossy(
            credential.pem_path.to_str().unwrap(),
        )),
        None,
    );

    // Same key, deterministic PKCS#1 v1.5: identical output.
    assert_eq!(sign_with(&from_text), sign_with(&from_file));
}

#[test]
fn signed_document_survives_reformatting_outside_reference() {
    let credential = TestCredential::new("Whitespace");
    let store = CertificateStore::new(
        Some(CredentialInput::Path(credential.pem_path.clone())),
        None,
    );
    let signed = sign_with(&store);

    // Whitespace between the root start tag and infDPS is outside the
    // referenced element and outside SignedInfo.
    let reformatted = signed.replacen("versao=\"1.00\">", "versao=\"1.00\">\n  ", 1);
    assert!(SignatureVerifier::new().verify(&reformatted).unwrap().success());

    let tampered = signed.replace("<tpAmb>2</tpAmb>", "<tpAmb>1</tpAmb>");
    let report = SignatureVerifier::new().verify(&tampered).unwrap();
    assert!(!report.digest_ok);
}

#[test]
fn wrong_password_degrades_to_unsigned() {
    let credential = TestCredential::new("Wrong Password");
    let store = CertificateStore::new(
        Some(CredentialInput::Path(credential.pfx_path.clone())),
        Some("not-the-password".to_string()),
    );

    assert!(store.key_material().unwrap().is_none());
    assert!(matches!(
        store.require_key_material(),
        Err(NfseError::SigningError(ref m)) if m.contains("PKCS#12")
    ));
}

#[test]
fn missing_file_is_fatal_and_retried() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("late.pem");
    let store = CertificateStore::new(Some(CredentialInput::Path(path.clone())), None);

    assert!(matches!(store.load(), Err(NfseError::CredentialNotFound(_))));
    assert!(!store.is_loaded());

    let credential = TestCredential::new("Late");
    std::fs::write(&path, &credential.pem_bundle).unwrap();
    assert!(store.load().unwrap().is_parsed());
}
