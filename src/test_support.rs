//! Self-signed credentials for unit tests.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder, X509};

use crate::domain::credential::KeyMaterial;

/// Create a self-signed RSA-2048 certificate and its key.
pub fn self_signed(common_name: &str) -> (PKey<Private>, X509) {
    let rsa = Rsa::generate(2048).expect("Should generate RSA key");
    let pkey = PKey::from_rsa(rsa).expect("Should create PKey");

    let mut name = X509NameBuilder::new().expect("Should create name builder");
    name.append_entry_by_text("CN", common_name)
        .expect("Should add CN");
    let name = name.build();

    let mut builder = X509Builder::new().expect("Should create X509 builder");
    builder.set_version(2).expect("Should set version");
    let serial = BigNum::from_u32(1)
        .expect("Should create serial")
        .to_asn1_integer()
        .expect("Should convert serial");
    builder.set_serial_number(&serial).expect("Should set serial");
    builder.set_subject_name(&name).expect("Should set subject");
    builder.set_issuer_name(&name).expect("Should set issuer");
    let not_before = Asn1Time::days_from_now(0).expect("Should create not_before");
    let not_after = Asn1Time::days_from_now(1).expect("Should create not_after");
    builder.set_not_before(&not_before).expect("Should set not_before");
    builder.set_not_after(&not_after).expect("Should set not_after");
    builder.set_pubkey(&pkey).expect("Should set pubkey");
    builder
        .sign(&pkey, MessageDigest::sha256())
        .expect("Should sign");

    (pkey, builder.build())
}

/// Unencrypted PEM bundle: key first, then certificate.
pub fn pem_bundle(pkey: &PKey<Private>, cert: &X509) -> String {
    let key = pkey.private_key_to_pem_pkcs8().expect("Should export key");
    let cert = cert.to_pem().expect("Should export cert");
    format!(
        "{}{}",
        String::from_utf8(key).expect("utf8"),
        String::from_utf8(cert).expect("utf8")
    )
}

/// Password-protected PKCS#12 container.
pub fn pkcs12_der(pkey: &PKey<Private>, cert: &X509, password: &str) -> Vec<u8> {
    Pkcs12::builder()
        .name("nfse-test")
        .pkey(pkey)
        .cert(cert)
        .build2(password)
        .expect("Should build PKCS#12")
        .to_der()
        .expect("Should encode PKCS#12")
}

/// Key material straight from a fresh self-signed certificate.
pub fn key_material(common_name: &str) -> KeyMaterial {
    let (pkey, cert) = self_signed(common_name);
    KeyMaterial::new(
        String::from_utf8(pkey.private_key_to_pem_pkcs8().expect("key")).expect("utf8"),
        String::from_utf8(cert.to_pem().expect("cert")).expect("utf8"),
    )
}
