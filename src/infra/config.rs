//! Configuration management infrastructure.
//!
//! Client settings live in a TOML file under the user's config directory:
//! API base URL, credential location, schema directory and validator
//! settings. The certificate password is never stored; only the name of the
//! environment variable holding it.

use crate::infra::error::{NfseError, NfseResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Restricted-production environment of the national API.
pub const DEFAULT_BASE_URL: &str = "https://sefin.producaorestrita.nfse.gov.br/SefinNacional";

/// Default environment variable carrying the credential password.
pub const DEFAULT_PASSWORD_ENV: &str = "NFSE_CERT_PASSWORD";

/// Client configuration with all exchange preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfiguration {
    /// Base URL every API path is resolved against
    pub base_url: String,

    /// PKCS#12 or PEM bundle used for signing and mutual TLS
    pub certificate_path: Option<PathBuf>,

    /// Environment variable holding the credential password
    pub certificate_password_env: String,

    /// Directory containing `DPS_v1.00.xsd`, `pedRegEvento_v1.00.xsd` and their includes
    pub schema_dir: Option<PathBuf>,

    /// Directory containing `dps.xml` and `dps_cancelamento.xml`
    pub template_dir: Option<PathBuf>,

    /// `xmllint` executable
    pub xmllint_path: PathBuf,

    /// Where validator scratch files go; system temp dir when unset
    pub scratch_dir: Option<PathBuf>,

    /// HTTP timeout
    pub timeout_seconds: u64,

    /// Validate generated documents before submitting them
    pub validate_before_submit: bool,

    /// Do not warn when a document leaves unsigned
    pub suppress_signing_warning: bool,
}

impl Default for ClientConfiguration {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            certificate_path: None,
            certificate_password_env: DEFAULT_PASSWORD_ENV.to_string(),
            schema_dir: None,
            template_dir: None,
            xmllint_path: PathBuf::from("xmllint"),
            scratch_dir: None,
            timeout_seconds: 30,
            validate_before_submit: false,
            suppress_signing_warning: false,
        }
    }
}

impl ClientConfiguration {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Credential password from the configured environment variable.
    #[must_use]
    pub fn certificate_password(&self) -> Option<String> {
        std::env::var(&self.certificate_password_env).ok()
    }

    /// Check values a client cannot work without.
    pub fn validate(&self) -> NfseResult<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            NfseError::ConfigurationError(format!("Invalid base URL {}: {e}", self.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NfseError::ConfigurationError(format!(
                "Base URL must be http(s): {}",
                self.base_url
            )));
        }

        if self.timeout_seconds == 0 {
            return Err(NfseError::ConfigurationError(
                "Network timeout must be greater than 0".to_string(),
            ));
        }

        if self.certificate_password_env.trim().is_empty() {
            return Err(NfseError::ConfigurationError(
                "Password environment variable name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(config_dir) => config_dir.join("nfse-national").join("config.toml"),
            None => PathBuf::from("nfse-national-config.toml"),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> NfseResult<ClientConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = ClientConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file, or defaults when there is none
    pub fn load_or_default(&self) -> NfseResult<ClientConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            Ok(ClientConfiguration::default())
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> NfseResult<ClientConfiguration> {
        log::info!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            NfseError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: ClientConfiguration = toml::from_str(&content).map_err(|e| {
            NfseError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &ClientConfiguration) -> NfseResult<()> {
        config.validate()?;
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                NfseError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            NfseError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            NfseError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> NfseResult<()> {
        let mut config = self.load_or_default()?;
        let optional_path = |v: &str| (!v.is_empty()).then(|| PathBuf::from(v));
        let boolean = |v: &str| {
            v.parse::<bool>()
                .map_err(|_| NfseError::ConfigurationError(format!("Invalid boolean value: {v}")))
        };

        match key {
            "base_url" => config.base_url = value.to_string(),
            "certificate_path" => config.certificate_path = optional_path(value),
            "certificate_password_env" => config.certificate_password_env = value.to_string(),
            "schema_dir" => config.schema_dir = optional_path(value),
            "template_dir" => config.template_dir = optional_path(value),
            "xmllint_path" => config.xmllint_path = PathBuf::from(value),
            "scratch_dir" => config.scratch_dir = optional_path(value),
            "timeout_seconds" => {
                config.timeout_seconds = value.parse().map_err(|_| {
                    NfseError::ConfigurationError(format!("Invalid timeout: {value}"))
                })?;
            }
            "validate_before_submit" => config.validate_before_submit = boolean(value)?,
            "suppress_signing_warning" => config.suppress_signing_warning = boolean(value)?,
            _ => {
                return Err(NfseError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_configuration() {
        let config = ClientConfiguration::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.certificate_password_env, "NFSE_CERT_PASSWORD");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = ClientConfiguration {
            certificate_path: Some(PathBuf::from("/etc/nfse/cert.pfx")),
            schema_dir: Some(PathBuf::from("/opt/xsd")),
            ..ClientConfiguration::default()
        };
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: ClientConfiguration = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ClientConfiguration =
            toml::from_str("base_url = \"https://example.test/api\"\n").unwrap();
        assert_eq!(config.base_url, "https://example.test/api");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_config_manager() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(&config_path);

        let config = manager.load_or_create_default().unwrap();
        assert!(config_path.exists());
        assert_eq!(config, ClientConfiguration::default());

        manager.update_value("timeout_seconds", "60").unwrap();
        manager.update_value("validate_before_submit", "true").unwrap();
        manager.update_value("schema_dir", "/opt/xsd").unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded.timeout_seconds, 60);
        assert!(loaded.validate_before_submit);
        assert_eq!(loaded.schema_dir, Some(PathBuf::from("/opt/xsd")));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        assert!(manager.update_value("timeout_seconds", "0").is_err());
        assert!(manager.update_value("base_url", "ftp://example.test").is_err());
        assert!(manager.update_value("verbose", "true").is_err());
        assert!(manager.update_value("validate_before_submit", "maybe").is_err());
    }
}
