//! XSD validation through an external `xmllint` process.
//!
//! The XML is written to a uniquely named scratch file which is removed when
//! the call returns, whatever the outcome.

use crate::infra::error::{NfseError, NfseResult};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Result of one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    /// Validator diagnostics (stderr for `xmllint`).
    Invalid(String),
}

impl ValidationOutcome {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

/// Validates XML text against a named schema.
///
/// `scratch_prefix` names any scratch artifacts (`dps`, `evento`); validators
/// that work in memory may ignore it.
pub trait SchemaValidator: Send + Sync {
    fn validate(
        &self,
        xml: &str,
        schema: &str,
        scratch_prefix: &str,
    ) -> NfseResult<ValidationOutcome>;

    /// Propagating mode: an invalid document becomes
    /// [`NfseError::ValidationError`].
    fn validate_strict(&self, xml: &str, schema: &str, scratch_prefix: &str) -> NfseResult<()> {
        match self.validate(xml, schema, scratch_prefix)? {
            ValidationOutcome::Valid => Ok(()),
            ValidationOutcome::Invalid(diagnostics) => Err(NfseError::ValidationError {
                schema: schema.to_string(),
                diagnostics,
            }),
        }
    }

    /// Suppressing mode: any failure, including a validator that could not
    /// run, yields `false`.
    fn validate_or_false(&self, xml: &str, schema: &str, scratch_prefix: &str) -> bool {
        match self.validate(xml, schema, scratch_prefix) {
            Ok(outcome) => outcome.is_valid(),
            Err(e) => {
                log::debug!("Validation against {schema} failed: {e}");
                false
            }
        }
    }
}

/// Runs `xmllint --noout --schema <xsd> <xml>`.
#[derive(Debug, Clone)]
pub struct XmllintValidator {
    xmllint_path: PathBuf,
    schema_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl XmllintValidator {
    /// `xmllint` from `PATH`, scratch files in the system temp directory.
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            xmllint_path: PathBuf::from("xmllint"),
            schema_dir: schema_dir.into(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.xmllint_path = path.into();
        self
    }

    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn schema_path(&self, schema: &str) -> PathBuf {
        self.schema_dir.join(schema)
    }
}

impl SchemaValidator for XmllintValidator {
    fn validate(
        &self,
        xml: &str,
        schema: &str,
        scratch_prefix: &str,
    ) -> NfseResult<ValidationOutcome> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        // Dropping the handle removes the file on every path out of here.
        let mut scratch = tempfile::Builder::new()
            .prefix(&format!("{scratch_prefix}-{millis}-"))
            .suffix(".xml")
            .rand_bytes(7)
            .tempfile_in(&self.scratch_dir)?;
        scratch.write_all(xml.as_bytes())?;
        scratch.flush()?;

        let xsd = self.schema_path(schema);
        log::debug!(
            "Running {} against {} for {}",
            self.xmllint_path.display(),
            xsd.display(),
            scratch.path().display()
        );

        let output = Command::new(&self.xmllint_path)
            .arg("--noout")
            .arg("--schema")
            .arg(&xsd)
            .arg(scratch.path())
            .output()
            .map_err(|e| NfseError::ValidationError {
                schema: schema.to_string(),
                diagnostics: format!("failed to run {}: {e}", self.xmllint_path.display()),
            })?;

        if output.status.success() {
            Ok(ValidationOutcome::Valid)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let diagnostics = if stderr.is_empty() {
                format!("validator exited with {}", output.status)
            } else {
                stderr
            };
            Ok(ValidationOutcome::Invalid(diagnostics))
        }
    }
}
