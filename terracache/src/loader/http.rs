//! Loader fetching payloads over HTTP.

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::trace;

use super::{BoxFuture, LoadError, TileLoader};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fetches `<base_url>/<key>.egrd` with an async reqwest client.
///
/// A 404 maps to [`LoadError::NotFound`]; every other failure to
/// [`LoadError::Http`].
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLoader {
    /// Creates a loader with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, LoadError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a loader with a custom timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LoadError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL requested for `key`.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}.egrd", self.base_url, key)
    }

    async fn fetch(&self, key: String) -> Result<Bytes, LoadError> {
        let url = self.url_for(&key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LoadError::Http(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LoadError::NotFound(key));
        }
        if !status.is_success() {
            return Err(LoadError::Http(format!("HTTP {} from {}", status, url)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::Http(format!("Failed to read response: {}", e)))?;
        trace!(url = %url, bytes = body.len(), "Fetched tile payload");
        Ok(body)
    }
}

impl TileLoader for HttpLoader {
    fn request(&self, key: &str) -> BoxFuture<'_, Result<Bytes, LoadError>> {
        Box::pin(self.fetch(key.to_string()))
    }

    fn name(&self) -> &str {
        "http"
    }
}
