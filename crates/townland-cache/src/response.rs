//! Response value stored in and returned from cache partitions.

use crate::error::{CacheError, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;

/// A fetched or cached HTTP response.
///
/// Cloning is cheap: the body is a reference-counted [`Bytes`] buffer, so a
/// response can be handed to the Store and to the caller at the same time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// URL the response was fetched from (the entry key).
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers in received order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
}

impl CachedResponse {
    /// Create a `200 OK` response with no headers.
    pub fn new(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Set the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `Content-Type` header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as a binary blob.
    pub fn blob(&self) -> Bytes {
        self.body.clone()
    }

    /// Body decoded as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| {
            CacheError::Other(format!("Response body of {} is not UTF-8: {}", self.url, e))
        })
    }

    /// Body deserialized as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| CacheError::Json {
            message: format!("Failed to parse JSON from {}: {}", self.url, e),
            source: Some(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Character {
        name: String,
        level: u32,
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = CachedResponse::new("https://x/1", "{}")
            .with_header("Content-Type", "application/json");
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn test_json_body() {
        let response = CachedResponse::new("https://x/c", r#"{"name":"ada","level":3}"#);
        let character: Character = response.json().unwrap();
        assert_eq!(
            character,
            Character {
                name: "ada".into(),
                level: 3
            }
        );

        let broken = CachedResponse::new("https://x/c", "not json");
        assert!(matches!(
            broken.json::<Character>(),
            Err(CacheError::Json { .. })
        ));
    }

    #[test]
    fn test_blob_shares_body() {
        let response = CachedResponse::new("https://x/img.png", vec![0x89, 0x50, 0x4e, 0x47]);
        let blob = response.blob();
        assert_eq!(&blob[..], &[0x89, 0x50, 0x4e, 0x47]);
        assert!(response.text().is_err());
    }

    #[test]
    fn test_status() {
        assert!(CachedResponse::new("https://x/1", "").is_success());
        assert!(!CachedResponse::new("https://x/1", "").with_status(404).is_success());
    }
}
