//! `NfseClient`: document generation, validation and the remote exchange
//! behind one handle.
//!
//! The credential is parsed lazily on first use and shared by the signer and
//! the mutual-TLS transport. Remote failures come back as
//! [`NfseError::TransportError`] (status and body kept) or
//! [`NfseError::NetworkError`], wrapped with the name of the operation.

use crate::adapters::http_transport::{
    HeadResponse, HttpTransportConfig, ReqwestTransport, Transport,
};
use crate::adapters::template::{DirectoryTemplates, TemplateRenderer};
use crate::domain::credential::CredentialInput;
use crate::domain::document::{DocumentKind, PipelineStage};
use crate::domain::envelope::TransportEnvelope;
use crate::infra::config::ClientConfiguration;
use crate::infra::error::{NfseError, NfseResult};
use crate::pipelines::document::{DocumentPipeline, GenerateOptions, GeneratedDocument};
use crate::services::certificate_store::CertificateStore;
use crate::services::schema_validator::{SchemaValidator, XmllintValidator};
use crate::services::transport_codec::TransportCodec;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// What to submit: a data model to render, or XML produced elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentInput {
    Data(Value),
    Xml(String),
}

impl From<Value> for DocumentInput {
    fn from(value: Value) -> Self {
        DocumentInput::Data(value)
    }
}

impl From<String> for DocumentInput {
    fn from(xml: String) -> Self {
        DocumentInput::Xml(xml)
    }
}

impl From<&str> for DocumentInput {
    fn from(xml: &str) -> Self {
        DocumentInput::Xml(xml.to_string())
    }
}

pub struct NfseClient {
    config: ClientConfiguration,
    store: Arc<CertificateStore>,
    renderer: Arc<dyn TemplateRenderer>,
    validator: Option<Arc<dyn SchemaValidator>>,
    transport: OnceLock<Arc<dyn Transport>>,
}

impl NfseClient {
    /// Client with an explicit credential; `config.certificate_path` is ignored.
    pub fn new(
        config: ClientConfiguration,
        credential: Option<CredentialInput>,
        password: Option<String>,
    ) -> NfseResult<Self> {
        config.validate()?;

        let renderer: Arc<dyn TemplateRenderer> = match &config.template_dir {
            Some(dir) => Arc::new(DirectoryTemplates::new(dir)),
            None => Arc::new(|template_id: &str, _: &Value| -> NfseResult<String> {
                Err(NfseError::TemplateError(format!(
                    "no template directory configured for {template_id}"
                )))
            }),
        };

        let validator = config.schema_dir.as_ref().map(|dir| {
            let mut validator =
                XmllintValidator::new(dir).with_executable(&config.xmllint_path);
            if let Some(scratch) = &config.scratch_dir {
                validator = validator.with_scratch_dir(scratch);
            }
            Arc::new(validator) as Arc<dyn SchemaValidator>
        });

        Ok(Self {
            store: Arc::new(CertificateStore::new(credential, password)),
            config,
            renderer,
            validator,
            transport: OnceLock::new(),
        })
    }

    /// Client whose credential comes from `certificate_path` and the password
    /// environment variable named in the configuration.
    pub fn from_config(config: ClientConfiguration) -> NfseResult<Self> {
        let credential = config.certificate_path.clone().map(CredentialInput::Path);
        let password = config.certificate_password();
        Self::new(config, credential, password)
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Use `transport` instead of building the `reqwest` one.
    #[must_use]
    pub fn with_transport(self, transport: Arc<dyn Transport>) -> Self {
        let _ = self.transport.set(transport);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfiguration {
        &self.config
    }

    fn pipeline(&self) -> DocumentPipeline {
        let pipeline = DocumentPipeline::new(Arc::clone(&self.renderer), Arc::clone(&self.store));
        match &self.validator {
            Some(v) => pipeline.with_validator(Arc::clone(v)),
            None => pipeline,
        }
    }

    fn transport(&self) -> NfseResult<Arc<dyn Transport>> {
        if let Some(t) = self.transport.get() {
            return Ok(Arc::clone(t));
        }
        let key_material = self.store.key_material()?;
        let http = HttpTransportConfig::new(&self.config.base_url)
            .with_timeout(self.config.timeout());
        let built: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(&http, key_material)?);
        Ok(Arc::clone(self.transport.get_or_init(|| built)))
    }

    fn default_options(&self) -> GenerateOptions {
        GenerateOptions {
            suppress_signing_warning: self.config.suppress_signing_warning,
            ..GenerateOptions::default()
        }
    }

    /// Render, minify and sign a DPS. The signature references `data["id"]`,
    /// which must equal the `Id` the template renders.
    pub fn generate_dps_xml(
        &self,
        data: &Value,
        options: GenerateOptions,
    ) -> NfseResult<GeneratedDocument> {
        self.generate(DocumentKind::Dps, data, options)
    }

    /// Render, minify and sign a cancellation event (`infPedReg`).
    pub fn generate_cancellation_xml(
        &self,
        data: &Value,
        options: GenerateOptions,
    ) -> NfseResult<GeneratedDocument> {
        self.generate(DocumentKind::Cancellation, data, options)
    }

    fn generate(
        &self,
        kind: DocumentKind,
        data: &Value,
        options: GenerateOptions,
    ) -> NfseResult<GeneratedDocument> {
        if data.is_null() {
            return Err(NfseError::InvalidInput(
                "data for XML generation is required".into(),
            ));
        }
        // Without an id the signature binds to the rendered element's `Id`.
        let id = match data.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };
        self.pipeline().generate(kind, &id, data, options)
    }

    /// Validate a DPS against `schema` (default `DPS_v1.00.xsd`). With
    /// `suppress_errors`, failures yield `Ok(false)`.
    pub fn validate_dps_xml(
        &self,
        xml: &str,
        schema: Option<&str>,
        suppress_errors: bool,
    ) -> NfseResult<bool> {
        self.validate(DocumentKind::Dps, xml, schema, suppress_errors)
    }

    /// Validate an event against `schema` (default `pedRegEvento_v1.00.xsd`).
    pub fn validate_event_xml(
        &self,
        xml: &str,
        schema: Option<&str>,
        suppress_errors: bool,
    ) -> NfseResult<bool> {
        self.validate(DocumentKind::Cancellation, xml, schema, suppress_errors)
    }

    fn validate(
        &self,
        kind: DocumentKind,
        xml: &str,
        schema: Option<&str>,
        suppress_errors: bool,
    ) -> NfseResult<bool> {
        let schema = schema.unwrap_or(kind.schema());
        let Some(validator) = &self.validator else {
            if suppress_errors {
                return Ok(false);
            }
            return Err(NfseError::ConfigurationError(
                "no schema directory configured".into(),
            ));
        };
        if suppress_errors {
            return Ok(validator.validate_or_false(xml, schema, kind.scratch_prefix()));
        }
        validator.validate_strict(xml, schema, kind.scratch_prefix())?;
        Ok(true)
    }

    /// Issue an NFS-e from a DPS data model or ready XML (`POST nfse`).
    pub async fn issue_nfse(&self, dps: impl Into<DocumentInput>) -> NfseResult<Value> {
        let envelope = self.envelope_for(DocumentKind::Dps, dps.into())?;
        self.post(&["nfse"], &envelope)
            .await
            .map_err(|e| e.with_context("Failed to issue NFS-e"))
    }

    /// Query an issued NFS-e by access key (`GET nfse/{key}`).
    pub async fn get_nfse(&self, access_key: &str) -> NfseResult<Value> {
        require("access key", access_key)?;
        self.call_get(&["nfse", access_key])
            .await
            .map_err(|e| e.with_context("Failed to query NFS-e"))
    }

    /// Query a DPS by id (`GET dps/{id}`).
    pub async fn get_dps(&self, dps_id: &str) -> NfseResult<Value> {
        require("DPS id", dps_id)?;
        self.call_get(&["dps", dps_id])
            .await
            .map_err(|e| e.with_context("Failed to query DPS"))
    }

    /// Check whether a DPS exists (`HEAD dps/{id}`).
    pub async fn check_dps(&self, dps_id: &str) -> NfseResult<HeadResponse> {
        require("DPS id", dps_id)?;
        let result = match self.transport() {
            Ok(t) => t.head(&["dps", dps_id]).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| e.with_context("Failed to check DPS"))
    }

    /// Cancel an NFS-e (`POST nfse/{key}/eventos`).
    ///
    /// With a data model the access key is read from `chaveAcesso`; with
    /// ready XML it must be passed in `access_key`.
    pub async fn cancel_nfse(
        &self,
        cancellation: impl Into<DocumentInput>,
        access_key: Option<&str>,
    ) -> NfseResult<Value> {
        let cancellation = cancellation.into();
        let key = match &cancellation {
            DocumentInput::Data(data) => data
                .get("chaveAcesso")
                .and_then(Value::as_str)
                .map(str::to_string),
            DocumentInput::Xml(_) => access_key.map(str::to_string),
        }
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            NfseError::InvalidInput("chaveAcesso is required for cancellation".into())
        })?;

        let envelope = self.envelope_for(DocumentKind::Cancellation, cancellation)?;
        self.post(&["nfse", &key, "eventos"], &envelope)
            .await
            .map_err(|e| e.with_context("Failed to cancel NFS-e"))
    }

    fn envelope_for(
        &self,
        kind: DocumentKind,
        input: DocumentInput,
    ) -> NfseResult<TransportEnvelope> {
        match input {
            DocumentInput::Data(data) => {
                let options = GenerateOptions {
                    validate: self.config.validate_before_submit,
                    encode: true,
                    ..self.default_options()
                };
                let generated = self.generate(kind, &data, options)?;
                generated.envelope.ok_or_else(|| {
                    NfseError::InvalidInput("pipeline produced no envelope".into())
                        .in_stage(PipelineStage::Encoding)
                })
            }
            DocumentInput::Xml(xml) => TransportCodec::encode(&xml, kind.envelope_field())
                .map_err(|e| e.in_stage(PipelineStage::Encoding)),
        }
    }

    async fn post(&self, segments: &[&str], envelope: &TransportEnvelope) -> NfseResult<Value> {
        let transport = self.transport()?;
        transport.post(segments, &envelope.to_json()).await
    }

    async fn call_get(&self, segments: &[&str]) -> NfseResult<Value> {
        let transport = self.transport()?;
        transport.get(segments).await
    }
}

impl std::fmt::Debug for NfseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NfseClient")
            .field("base_url", &self.config.base_url)
            .field("store", &self.store)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

fn require(what: &str, value: &str) -> NfseResult<()> {
    if value.trim().is_empty() {
        Err(NfseError::InvalidInput(format!("{what} is required")))
    } else {
        Ok(())
    }
}
