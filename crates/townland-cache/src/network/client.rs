//! HTTP fetcher backed by reqwest.
//!
//! Provides a wrapper around reqwest with:
//! - Configurable timeouts
//! - User-agent management
//! - Non-success statuses reported as errors

use super::Fetcher;
use crate::config::NetworkConfig;
use crate::error::{CacheError, Result};
use crate::response::CachedResponse;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client used to fill cache misses.
pub struct HttpClient {
    client: Client,
    /// Default timeout for requests.
    default_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client with a custom default timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| CacheError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn request_error(&self, url: &str, err: reqwest::Error) -> CacheError {
        if err.is_timeout() {
            CacheError::Timeout(self.default_timeout)
        } else {
            CacheError::Network {
                message: format!("GET {} failed: {}", url, err),
                source: Some(err),
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<CachedResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("GET {} returned {}", url, status);
            return Err(CacheError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let headers = collect_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error(url, e))?;

        debug!("Fetched {} ({} bytes)", url, body.len());

        Ok(CachedResponse {
            url: final_url,
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Copy headers into owned pairs, skipping values that are not valid text.
fn collect_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, CONTENT_TYPE, ETAG};

    #[test]
    fn test_collect_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
        headers.insert(ETAG, HeaderValue::from_bytes(b"\xff\xfe").unwrap());

        let collected = collect_headers(&headers);
        assert_eq!(
            collected,
            vec![("content-type".to_string(), "image/png".to_string())]
        );
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpClient::new().unwrap();
        assert_eq!(client.default_timeout(), NetworkConfig::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_client_with_timeout() {
        let client = HttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(client.default_timeout(), Duration::from_secs(5));
    }
}
