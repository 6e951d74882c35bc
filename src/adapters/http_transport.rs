//! HTTP transport adapter for the national NFS-e API.
//!
//! JSON in, JSON out, relative paths resolved against a base URL, optional
//! client certificate for mutual TLS. Non-2xx answers become
//! [`NfseError::TransportError`] carrying the status and the raw body; a
//! request that never got an answer is a [`NfseError::NetworkError`].

use crate::domain::credential::KeyMaterial;
use crate::infra::error::{NfseError, NfseResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Status and headers of a `HEAD` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

/// Outbound calls the client needs. Paths are given as raw segments; the
/// implementation encodes them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, segments: &[&str], body: &Value) -> NfseResult<Value>;
    async fn get(&self, segments: &[&str]) -> NfseResult<Value>;
    async fn head(&self, segments: &[&str]) -> NfseResult<HeadResponse>;
}

/// Transport settings.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl HttpTransportConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`Transport`] over `reqwest`.
pub struct ReqwestTransport {
    base_url: Url,
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build the HTTP client. With `identity`, the PEM key and certificate
    /// are presented as the TLS client certificate.
    pub fn new(config: &HttpTransportConfig, identity: Option<&KeyMaterial>) -> NfseResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            NfseError::ConfigurationError(format!("invalid base URL {}: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(NfseError::ConfigurationError(format!(
                "base URL {} cannot carry a path",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse().map_err(invalid_header)?);
        headers.insert(ACCEPT, "application/json".parse().map_err(invalid_header)?);

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(concat!("nfse-national/", env!("CARGO_PKG_VERSION")));

        if let Some(km) = identity {
            let pem = format!("{}\n{}", km.private_key_pem(), km.certificate_pem());
            let identity = reqwest::Identity::from_pem(pem.as_bytes()).map_err(|e| {
                NfseError::CredentialError(format!("client certificate rejected: {e}"))
            })?;
            builder = builder.identity(identity);
            log::debug!("Mutual TLS identity configured");
        }

        let client = builder
            .build()
            .map_err(|e| NfseError::NetworkError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { base_url, client })
    }

    /// Resolve `segments` under the base URL, percent-encoding each one.
    pub fn url_for(&self, segments: &[&str]) -> NfseResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| NfseError::ConfigurationError("base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_body(response: reqwest::Response) -> NfseResult<Value> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(NfseError::TransportError {
                message: "request rejected".to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(parse_body(&text))
    }
}

fn invalid_header(e: reqwest::header::InvalidHeaderValue) -> NfseError {
    NfseError::ConfigurationError(format!("invalid header: {e}"))
}

/// JSON when the body parses, a JSON string otherwise, `null` when empty.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, segments: &[&str], body: &Value) -> NfseResult<Value> {
        let url = self.url_for(segments)?;
        log::info!("POST {url}");
        let response = self.client.post(url).json(body).send().await?;
        Self::read_body(response).await
    }

    async fn get(&self, segments: &[&str]) -> NfseResult<Value> {
        let url = self.url_for(segments)?;
        log::info!("GET {url}");
        let response = self.client.get(url).send().await?;
        Self::read_body(response).await
    }

    async fn head(&self, segments: &[&str]) -> NfseResult<HeadResponse> {
        let url = self.url_for(segments)?;
        log::info!("HEAD {url}");
        let response = self.client.head(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NfseError::TransportError {
                message: "request rejected".to_string(),
                status: status.as_u16(),
                body: String::new(),
            });
        }
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Ok(HeadResponse {
            status: status.as_u16(),
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> ReqwestTransport {
        ReqwestTransport::new(&HttpTransportConfig::new(base), None).unwrap()
    }

    #[test]
    fn joins_and_encodes_segments() {
        let t = transport("https://sefin.producaorestrita.nfse.gov.br/SefinNacional");
        assert_eq!(
            t.url_for(&["nfse", "3326/01 x", "eventos"]).unwrap().as_str(),
            "https://sefin.producaorestrita.nfse.gov.br/SefinNacional/nfse/3326%2F01%20x/eventos"
        );

        let trailing = transport("https://example.test/api/");
        assert_eq!(
            trailing.url_for(&["dps", "DPS1"]).unwrap().as_str(),
            "https://example.test/api/dps/DPS1"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        let err = ReqwestTransport::new(&HttpTransportConfig::new("not a url"), None)
            .err()
            .unwrap();
        assert!(matches!(err, NfseError::ConfigurationError(_)));
        assert!(ReqwestTransport::new(&HttpTransportConfig::new("mailto:a@b"), None).is_err());
    }

    #[test]
    fn accepts_extracted_identity() {
        let km = crate::test_support::key_material("mTLS");
        assert!(ReqwestTransport::new(
            &HttpTransportConfig::new("https://example.test"),
            Some(&km)
        )
        .is_ok());
    }

    #[test]
    fn body_parsing() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}")["a"], 1);
        assert_eq!(parse_body("<html/>"), Value::String("<html/>".into()));
    }
}
