//! Credential inputs and the key material derived from them.

use crate::domain::constants::{PEM_CERTIFICATE_MARKER, PEM_PRIVATE_KEY_MARKER};
use std::fmt;
use std::path::PathBuf;

/// Where the signing credential comes from.
#[derive(Clone)]
pub enum CredentialInput {
    /// Raw PKCS#12 or PEM bytes already in memory.
    Bytes(Vec<u8>),
    /// Path to a `.pfx`/`.p12` or PEM file.
    Path(PathBuf),
    /// Literal PEM text holding both the certificate and the private key.
    Pem(String),
}

impl CredentialInput {
    /// Classify a string the way configuration files and CLI flags carry it:
    /// text containing a PEM armor line is literal PEM, anything else a path.
    #[must_use]
    pub fn from_str_lossy(value: &str) -> Self {
        if value.contains("-----BEGIN") {
            CredentialInput::Pem(value.to_string())
        } else {
            CredentialInput::Path(PathBuf::from(value))
        }
    }
}

impl fmt::Debug for CredentialInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialInput::Bytes(b) => write!(f, "CredentialInput::Bytes(len={})", b.len()),
            CredentialInput::Path(p) => write!(f, "CredentialInput::Path({})", p.display()),
            CredentialInput::Pem(s) => write!(f, "CredentialInput::Pem(len={})", s.len()),
        }
    }
}

/// Container format inferred from the credential bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFormat {
    Pkcs12,
    PemBundle,
}

/// Loaded credential bytes with their inferred format. Immutable once built.
#[derive(Clone)]
pub struct CredentialSource {
    bytes: Box<[u8]>,
    format: CredentialFormat,
}

impl CredentialSource {
    /// Infer the format: a certificate marker plus a private key marker means
    /// a PEM bundle, anything else is handed to the PKCS#12 parser.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let format = match std::str::from_utf8(&bytes) {
            Ok(text)
                if text.contains(PEM_CERTIFICATE_MARKER)
                    && text.contains(PEM_PRIVATE_KEY_MARKER) =>
            {
                CredentialFormat::PemBundle
            }
            _ => CredentialFormat::Pkcs12,
        };
        Self {
            bytes: bytes.into_boxed_slice(),
            format,
        }
    }

    #[must_use]
    pub fn format(&self) -> CredentialFormat {
        self.format
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CredentialSource(format={:?}, len={})",
            self.format,
            self.bytes.len()
        )
    }
}

/// Unencrypted PEM key and certificate, ready for signing and mutual TLS.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    private_key_pem: String,
    certificate_pem: String,
}

impl KeyMaterial {
    #[must_use]
    pub fn new(private_key_pem: String, certificate_pem: String) -> Self {
        Self {
            private_key_pem,
            certificate_pem,
        }
    }

    #[must_use]
    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    #[must_use]
    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    /// Base64 body of the certificate with armor lines and whitespace removed.
    #[must_use]
    pub fn certificate_base64(&self) -> Option<String> {
        certificate_base64(&self.certificate_pem)
    }
}

// Key bytes must never end up in logs.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyMaterial(key=[REDACTED], cert_len={})",
            self.certificate_pem.len()
        )
    }
}

/// Outcome of the one-time credential load.
///
/// "Not attempted yet" is represented by the store's empty init cell, so a
/// value of this type always means a load happened.
#[derive(Debug, Clone)]
pub enum CredentialStatus {
    /// Key and certificate extracted.
    Parsed(KeyMaterial),
    /// No credential configured, or the bundle yielded no key/certificate.
    /// Carries the reason for diagnostics.
    Unavailable(String),
}

impl CredentialStatus {
    #[must_use]
    pub fn key_material(&self) -> Option<&KeyMaterial> {
        match self {
            CredentialStatus::Parsed(km) => Some(km),
            CredentialStatus::Unavailable(_) => None,
        }
    }

    #[must_use]
    pub fn is_parsed(&self) -> bool {
        matches!(self, CredentialStatus::Parsed(_))
    }
}

/// Extract the first `CERTIFICATE` block body as one base64 line.
#[must_use]
pub fn certificate_base64(pem: &str) -> Option<String> {
    pem_block(pem, "CERTIFICATE").map(|block| {
        block
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .flat_map(|l| l.chars())
            .filter(|c| !c.is_whitespace())
            .collect()
    })
}

/// Return the first complete PEM block whose label is `label`, armor included.
#[must_use]
pub fn pem_block<'a>(pem: &'a str, label: &str) -> Option<&'a str> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");
    let start = pem.find(&begin)?;
    let stop = pem[start..].find(&end)? + start + end.len();
    Some(&pem[start..stop])
}

/// Return the first private key block of any flavour (`PRIVATE KEY`,
/// `RSA PRIVATE KEY`, `ENCRYPTED PRIVATE KEY`, ...) and its label.
#[must_use]
pub fn private_key_block(pem: &str) -> Option<(&str, &str)> {
    let mut search = 0;
    while let Some(rel) = pem[search..].find("-----BEGIN ") {
        let at = search + rel;
        let label_start = at + "-----BEGIN ".len();
        let label_end = label_start + pem[label_start..].find("-----")?;
        let label = &pem[label_start..label_end];
        if label.ends_with(PEM_PRIVATE_KEY_MARKER) {
            return pem_block(&pem[at..], label).map(|block| (label, block));
        }
        search = label_end;
    }
    None
}
