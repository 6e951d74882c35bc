//! `DocumentPipeline` turns a data model into a submission-ready document.
//!
//! Rendering → Minifying → Signing → Validating → Encoding. Each stage is
//! synchronous; the first failure aborts the run and comes back wrapped with
//! the stage it happened in, the original error kind kept underneath.

use crate::adapters::template::TemplateRenderer;
use crate::domain::document::{DocumentKind, PipelineStage, ReferenceTarget, RenderedDocument};
use crate::domain::envelope::TransportEnvelope;
use crate::infra::error::{NfseError, NfseResult};
use crate::services::certificate_store::CertificateStore;
use crate::services::schema_validator::SchemaValidator;
use crate::services::transport_codec::TransportCodec;
use crate::services::xml_signer::XmlSigner;
use serde_json::Value;
use std::sync::Arc;

/// Message used when a document leaves the pipeline unsigned.
pub const UNSIGNED_WARNING: &str = "XML not signed (certificate not available)";

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Skip the unsigned-document warning.
    pub suppress_signing_warning: bool,
    /// Fail instead of returning an unsigned document.
    pub require_signature: bool,
    /// Run the schema validator on the final XML.
    pub validate: bool,
    /// Build the transport envelope.
    pub encode: bool,
}

impl GenerateOptions {
    #[must_use]
    pub fn submission() -> Self {
        Self {
            encode: true,
            ..Self::default()
        }
    }
}

/// Pipeline output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub kind: DocumentKind,
    /// Signed XML (with declaration) or the minified unsigned XML.
    pub xml: String,
    pub signed: bool,
    /// Non-fatal conditions raised during the run.
    pub warnings: Vec<String>,
    pub envelope: Option<TransportEnvelope>,
}

pub struct DocumentPipeline {
    renderer: Arc<dyn TemplateRenderer>,
    store: Arc<CertificateStore>,
    signer: Arc<XmlSigner>,
    validator: Option<Arc<dyn SchemaValidator>>,
}

impl DocumentPipeline {
    pub fn new(renderer: Arc<dyn TemplateRenderer>, store: Arc<CertificateStore>) -> Self {
        Self {
            renderer,
            store,
            signer: Arc::new(XmlSigner::new()),
            validator: None,
        }
    }

    #[must_use]
    pub fn with_signer(mut self, signer: XmlSigner) -> Self {
        self.signer = Arc::new(signer);
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Render `kind`'s template against `data`, then run the remaining stages.
    /// `id` is the expected `Id` of the signed element; empty adopts whatever
    /// `Id` the rendered element carries.
    pub fn generate(
        &self,
        kind: DocumentKind,
        id: &str,
        data: &Value,
        options: GenerateOptions,
    ) -> NfseResult<GeneratedDocument> {
        // Credential problems surface before any rendering work.
        self.store
            .load()
            .map_err(|e| e.in_stage(PipelineStage::Signing))?;

        log::debug!("Rendering {} for {kind}", kind.template_id());
        let raw = self
            .renderer
            .render(kind.template_id(), data)
            .map_err(|e| e.in_stage(PipelineStage::Rendering))?;
        self.process(kind, id, RenderedDocument::new(raw), options)
    }

    /// Run minify → sign → validate → encode on already rendered XML.
    pub fn process(
        &self,
        kind: DocumentKind,
        id: &str,
        rendered: RenderedDocument,
        options: GenerateOptions,
    ) -> NfseResult<GeneratedDocument> {
        let minified = rendered.minified();
        if minified.as_str().is_empty() {
            return Err(NfseError::TemplateError("rendered document is empty".into())
                .in_stage(PipelineStage::Minifying));
        }

        let mut warnings = Vec::new();
        let key_material = self
            .store
            .key_material()
            .map_err(|e| e.in_stage(PipelineStage::Signing))?;

        let (xml, signed) = match key_material {
            Some(km) => {
                let signed = self
                    .signer
                    .sign(minified.as_str(), &ReferenceTarget::for_kind(kind, id), km)
                    .map_err(|e| e.in_stage(PipelineStage::Signing))?;
                (signed.into_string(), true)
            }
            None if options.require_signature => {
                let err = self
                    .store
                    .require_key_material()
                    .err()
                    .unwrap_or_else(|| NfseError::SigningError("no key material".into()));
                return Err(err.in_stage(PipelineStage::Signing));
            }
            None => {
                if !options.suppress_signing_warning {
                    log::warn!("Warning: {UNSIGNED_WARNING}.");
                    warnings.push(UNSIGNED_WARNING.to_string());
                }
                (minified.into_string(), false)
            }
        };

        if options.validate {
            let validator = self.validator.as_ref().ok_or_else(|| {
                NfseError::ConfigurationError("no schema validator configured".into())
                    .in_stage(PipelineStage::Validating)
            })?;
            validator
                .validate_strict(&xml, kind.schema(), kind.scratch_prefix())
                .map_err(|e| e.in_stage(PipelineStage::Validating))?;
        }

        let envelope = if options.encode {
            Some(
                TransportCodec::encode(&xml, kind.envelope_field())
                    .map_err(|e| e.in_stage(PipelineStage::Encoding))?,
            )
        } else {
            None
        };

        log::info!(
            "Generated {kind} ({}, {} bytes)",
            if signed { "signed" } else { "unsigned" },
            xml.len()
        );
        Ok(GeneratedDocument {
            kind,
            xml,
            signed,
            warnings,
            envelope,
        })
    }
}
