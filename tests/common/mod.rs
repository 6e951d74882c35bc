//! Shared fixtures for integration tests: self-signed credentials written to
//! temporary files and sample DPS/event templates.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use std::path::PathBuf;
use tempfile::TempDir;

pub const PASSWORD: &str = "test-password";

pub const DPS_ID: &str = "DPS330455723802754300017500900000000000000001";
pub const ACCESS_KEY: &str = "33260100000000000000000000000000000000000000000000";

/// DPS template with `{{placeholders}}`, indented the way template files are.
pub const DPS_TEMPLATE: &str = r#"<DPS xmlns="http://www.sped.fazenda.gov.br/nfse" versao="1.00">
  <infDPS Id="{{id}}">
    <tpAmb>2</tpAmb>
    <dhEmi>{{dhEmi}}</dhEmi>
    <prest>
      <CNPJ>{{prestador.cnpj}}</CNPJ>
    </prest>
    <serv>
      <xDescServ>{{descricao}}</xDescServ>
    </serv>
  </infDPS>
</DPS>
"#;

pub const CANCELLATION_TEMPLATE: &str = r#"<pedRegEvento xmlns="http://www.sped.fazenda.gov.br/nfse" versao="1.00">
  <infPedReg Id="{{id}}">
    <tpAmb>2</tpAmb>
    <chNFSe>{{chaveAcesso}}</chNFSe>
    <e101101>
      <xDesc>Cancelamento de NFS-e</xDesc>
      <xMotivo>{{motivo}}</xMotivo>
    </e101101>
  </infPedReg>
</pedRegEvento>
"#;

/// Create a self-signed RSA certificate and its key.
pub fn create_test_certificate(common_name: &str) -> (PKey<Private>, X509) {
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
    builder
        .set_serial_number(&serial)
        .expect("Should set serial");
    builder.set_subject_name(&name).expect("Should set subject");
    builder.set_issuer_name(&name).expect("Should set issuer");
    let not_before = Asn1Time::days_from_now(0).expect("Should create not_before");
    let not_after = Asn1Time::days_from_now(1).expect("Should create not_after");
    builder
        .set_not_before(&not_before)
        .expect("Should set not_before");
    builder
        .set_not_after(&not_after)
        .expect("Should set not_after");
    builder.set_pubkey(&pkey).expect("Should set pubkey");
    builder
        .sign(&pkey, MessageDigest::sha256())
        .expect("Should sign");

    (pkey, builder.build())
}

/// Credential fixtures on disk. Files vanish with the struct.
pub struct TestCredential {
    pub dir: TempDir,
    pub pfx_path: PathBuf,
    pub pem_path: PathBuf,
    pub pem_bundle: String,
    pub certificate_pem: String,
}

impl TestCredential {
    pub fn new(common_name: &str) -> Self {
        let (pkey, cert) = create_test_certificate(common_name);
        let dir = TempDir::new().expect("Should create temp dir");

        let pfx = Pkcs12::builder()
            .name("nfse-test")
            .pkey(&pkey)
            .cert(&cert)
            .build2(PASSWORD)
            .expect("Should build PKCS#12")
            .to_der()
            .expect("Should encode PKCS#12");
        let pfx_path = dir.path().join("cert.pfx");
        std::fs::write(&pfx_path, pfx).expect("Should write pfx");

        let key_pem = String::from_utf8(pkey.private_key_to_pem_pkcs8().expect("key"))
            .expect("utf8");
        let certificate_pem = String::from_utf8(cert.to_pem().expect("cert")).expect("utf8");
        let pem_bundle = format!("{certificate_pem}{key_pem}");
        let pem_path = dir.path().join("cert.pem");
        std::fs::write(&pem_path, &pem_bundle).expect("Should write pem");

        Self {
            dir,
            pfx_path,
            pem_path,
            pem_bundle,
            certificate_pem,
        }
    }

    /// Base64 DER body of the certificate, as embedded in `X509Certificate`.
    pub fn certificate_base64(&self) -> String {
        self.certificate_pem
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .collect()
    }
}

/// DPS data model matching [`DPS_TEMPLATE`].
pub fn dps_data() -> serde_json::Value {
    serde_json::json!({
        "id": DPS_ID,
        "dhEmi": "2026-01-02T14:30:00-03:00",
        "prestador": { "cnpj": "38027543000175" },
        "descricao": "Consultoria em TI & suporte"
    })
}

/// Cancellation data model matching [`CANCELLATION_TEMPLATE`].
pub fn cancellation_data() -> serde_json::Value {
    serde_json::json!({
        "id": format!("PRE{ACCESS_KEY}101101"),
        "chaveAcesso": ACCESS_KEY,
        "motivo": "Erro na emissao"
    })
}

/// Template directory holding `dps.xml` and `dps_cancelamento.xml`.
pub fn template_dir() -> TempDir {
    let dir = TempDir::new().expect("Should create temp dir");
    std::fs::write(dir.path().join("dps.xml"), DPS_TEMPLATE).expect("write dps.xml");
    std::fs::write(dir.path().join("dps_cancelamento.xml"), CANCELLATION_TEMPLATE)
        .expect("write dps_cancelamento.xml");
    dir
}
