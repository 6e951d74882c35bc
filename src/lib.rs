//! NFS-e national exchange library
//!
//! Builds DPS and event-registration XML for the Brazilian national NFS-e
//! API: fixed-format identifiers, enveloped XML-DSig signatures (C14N 1.0,
//! RSA-SHA1) with a PKCS#12 or PEM credential, XSD validation through
//! `xmllint`, and the gzip + base64 JSON envelope the API expects.

pub mod adapters;
pub mod client;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

#[cfg(test)]
mod test_support;

pub use adapters::{DirectoryTemplates, HeadResponse, ReqwestTransport, TemplateRenderer, Transport};
pub use client::{DocumentInput, NfseClient};
pub use domain::credential::{CredentialInput, CredentialStatus, KeyMaterial};
pub use domain::document::{
    minify_xml, DocumentKind, PipelineStage, ReferenceTarget, RenderedDocument, SignedDocument,
};
pub use domain::envelope::TransportEnvelope;
pub use domain::identifiers::{
    build_cancellation_event_id, build_document_id, build_event_id, build_event_id_checked,
    format_timestamp, now_timestamp, DpsIdFields,
};
pub use domain::verification::VerificationReport;
pub use infra::config::{ClientConfiguration, ConfigManager};
pub use infra::error::{NfseError, NfseResult};
pub use pipelines::{DocumentPipeline, GenerateOptions, GeneratedDocument};
pub use services::{
    CertificateStore, SchemaValidator, SignatureVerifier, TransportCodec, ValidationOutcome,
    XmlSigner, XmllintValidator,
};
