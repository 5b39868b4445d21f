//! Remote source client: plain GET requests, opaque bodies.

use async_trait::async_trait;
use ota_common::AgentError;
use std::time::Duration;

const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Remote source seam, used for both the version probe and the payload
/// fetch.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// GET a URL and return the body as text.
    async fn fetch_text(&self, url: &str) -> Result<String, AgentError>;

    /// GET a URL and return the raw body bytes.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, AgentError>;
}

/// HTTP-backed remote source with a single bounded client.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("otad/{}", CURRENT_VERSION))
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, AgentError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AgentError::RemoteFetch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AgentError::RemoteFetch(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch_text(&self, url: &str) -> Result<String, AgentError> {
        let resp = self.get(url).await?;
        resp.text()
            .await
            .map_err(|e| AgentError::RemoteFetch(e.to_string()))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, AgentError> {
        let resp = self.get(url).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| AgentError::RemoteFetch(e.to_string()))?;

        // A zero-length program is a truncated transfer, not an update.
        if body.is_empty() {
            return Err(AgentError::RemoteFetch(format!(
                "{} returned an empty body",
                url
            )));
        }
        Ok(body.to_vec())
    }
}
