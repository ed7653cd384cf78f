//! # Host Capabilities
//!
//! The form engine is embedded into a larger server product and depends on
//! the host for two things only: issuing HTTP requests against the admin
//! server, and encrypting secret values with the server's public key.
//! Both are modelled as capability traits so the core logic never touches
//! a concrete HTTP stack or crypto implementation.
//!
//! [`HttpTransport`] is the stock [`Transport`] implementation over
//! `reqwest`; tests and exotic hosts supply their own.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Flat request parameter map produced by the serializer.
///
/// `None` is an explicit null: the server interprets it as "clear this
/// field", which is different from omitting the key. Form encoding sends
/// nulls as empty strings, matching the host request helper's behavior.
pub type RequestParams = BTreeMap<String, Option<String>>;

/// Transport failure. Nothing here is fatal to the form: every failure
/// surfaces as a generic alert or an inline message and the user retries.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server answered HTTP {status} for {url}")]
    Status { url: String, status: u16 },
}

/// Host request capability.
///
/// URLs are given relative to the admin server root; implementations own
/// base-url resolution. Responses are returned as text because the admin
/// endpoints mix XML, JSON and plain-text payloads and the interpreting
/// layer decides per call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, TransportError>;

    /// Form-encoded POST. `None` values are transmitted as empty strings.
    async fn post_form(&self, url: &str, params: &RequestParams)
        -> Result<String, TransportError>;

    /// JSON POST with `Content-Type: application/json`.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<String, TransportError>;
}

/// Secret encryption failed or the host carries no encryption capability.
#[derive(Debug, Error)]
#[error("could not encrypt secret value: {reason}")]
pub struct EncryptError {
    pub reason: String,
}

impl EncryptError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Host encryption capability: a synchronous transform of a plaintext
/// secret under the server-supplied public key. The engine never sends
/// plaintext secrets over the wire.
pub trait SecretEncryptor: Send + Sync {
    fn encrypt(&self, plaintext: &str, public_key: &str) -> Result<String, EncryptError>;
}

/// `reqwest`-backed [`Transport`] against a fixed admin server base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Server-routed URLs arrive with or without a leading slash; both
    /// resolve against the base URL the same way.
    fn resolve(&self, url: &str) -> String {
        format!("{}/{}", self.base_url, url.trim_start_matches('/'))
    }

    async fn read_response(
        url: String,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<String, TransportError> {
        let response = result.map_err(|source| TransportError::Network {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|source| TransportError::Network { url, source })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        let url = self.resolve(url);
        debug!(%url, "GET");
        Self::read_response(url.clone(), self.client.get(&url).send().await).await
    }

    async fn post_form(
        &self,
        url: &str,
        params: &RequestParams,
    ) -> Result<String, TransportError> {
        let url = self.resolve(url);
        debug!(%url, fields = params.len(), "POST form");

        let pairs: Vec<(&str, &str)> = params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref().unwrap_or("")))
            .collect();

        Self::read_response(url.clone(), self.client.post(&url).form(&pairs).send().await)
            .await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<String, TransportError> {
        let url = self.resolve(url);
        debug!(%url, "POST json");
        Self::read_response(url.clone(), self.client.post(&url).json(body).send().await)
            .await
    }
}
