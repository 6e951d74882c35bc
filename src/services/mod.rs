//! Service layer module root.
//! Credential loading, XML signing and verification, schema validation and
//! transport encoding.

pub mod certificate_store;
pub mod schema_validator;
pub mod signature_verifier;
pub mod transport_codec;
pub mod xml_signer;
pub mod xsd_patch;

pub use certificate_store::{parse_credential, CertificateStore};
pub use schema_validator::{SchemaValidator, ValidationOutcome, XmllintValidator};
pub use signature_verifier::SignatureVerifier;
pub use transport_codec::TransportCodec;
pub use xml_signer::{KeyInfoStrategy, X509CertificateKeyInfo, XmlSigner};
pub use xsd_patch::{patch_xsd, patch_xsd_file, XsdPatch};
