//! Error types for DPS/event assembly, signing and submission.
//! Error handling types and result definitions shared by every layer.

use crate::domain::document::PipelineStage;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for NFS-e operations
pub type NfseResult<T> = Result<T, NfseError>;

/// Error taxonomy for the document pipeline and the remote exchange
#[derive(Error, Debug, miette::Diagnostic)]
pub enum NfseError {
    #[error("Certificate not found at path: {}", .0.display())]
    CredentialNotFound(PathBuf),

    #[error("Credential error: {0}")]
    CredentialError(String),

    /// Bundle had no extractable key or certificate. The store degrades to
    /// unsigned mode instead of surfacing this, except on explicit requests.
    #[error("Credential parse error: {0}")]
    CredentialParseError(String),

    #[error("Signing failed: {0}")]
    SigningError(String),

    #[error("XSD validation errors ({schema}):\n{diagnostics}")]
    ValidationError { schema: String, diagnostics: String },

    /// Non-2xx answer from the remote service.
    #[error("{message} (HTTP {status})")]
    TransportError {
        message: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Malformed XML: {0}")]
    XmlError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<NfseError>,
    },

    #[error("{context}: {source}")]
    Operation {
        context: String,
        #[source]
        source: Box<NfseError>,
    },
}

impl NfseError {
    /// Wrap with the pipeline stage that produced the error.
    #[must_use]
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        NfseError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Wrap with the name of the client operation that failed.
    #[must_use]
    pub fn with_context(self, context: impl Into<String>) -> Self {
        NfseError::Operation {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through stage and operation wrappers.
    #[must_use]
    pub fn root(&self) -> &NfseError {
        match self {
            NfseError::Stage { source, .. } | NfseError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// HTTP status of a remote rejection, if this error carries one.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self.root() {
            NfseError::TransportError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body of a remote rejection, if this error carries one.
    #[must_use]
    pub fn response_body(&self) -> Option<&str> {
        match self.root() {
            NfseError::TransportError { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }

    /// Pipeline stage the error was raised in, if any.
    #[must_use]
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            NfseError::Stage { stage, .. } => Some(*stage),
            NfseError::Operation { source, .. } => source.stage(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for NfseError {
    fn from(error: std::io::Error) -> Self {
        NfseError::IoError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for NfseError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        NfseError::SigningError(error.to_string())
    }
}

impl From<quick_xml::Error> for NfseError {
    fn from(error: quick_xml::Error) -> Self {
        NfseError::XmlError(error.to_string())
    }
}

impl From<reqwest::Error> for NfseError {
    fn from(error: reqwest::Error) -> Self {
        NfseError::NetworkError(error.to_string())
    }
}

impl From<serde_json::Error> for NfseError {
    fn from(error: serde_json::Error) -> Self {
        NfseError::InvalidInput(format!("JSON error: {error}"))
    }
}
