//! Partition and entry addressing.

use crate::error::{CacheError, Result};
use std::fmt;
use url::Url;

/// Identity of a Store partition: lowercase `prefix:key`.
///
/// Construction is deterministic and case-insensitive, so `"Room"` and
/// `"room"` address the same partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(String);

impl PartitionId {
    pub fn new(prefix: &str, key: &str) -> Self {
        Self(format!("{}:{}", prefix, key).to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PartitionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a URL into the key entries are stored under.
///
/// Scheme and host are lowercased and an empty path becomes `/`, matching
/// what a request object would report as its URL.
pub fn request_key(url: &str) -> Result<String> {
    Url::parse(url)
        .map(|parsed| parsed.to_string())
        .map_err(|e| CacheError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_lowercase_prefixed() {
        let id = PartitionId::new("townland", "Room");
        assert_eq!(id.as_str(), "townland:room");
        assert_eq!(id.to_string(), "townland:room");
    }

    #[test]
    fn test_identity_is_case_insensitive() {
        assert_eq!(
            PartitionId::new("townland", "Room"),
            PartitionId::new("townland", "room")
        );
        assert_eq!(
            PartitionId::new("TownLand", "CHARACTER"),
            PartitionId::new("townland", "character")
        );
        assert_ne!(
            PartitionId::new("townland", "room"),
            PartitionId::new("townland", "extera")
        );
    }

    #[test]
    fn test_request_key_normalizes() {
        assert_eq!(request_key("https://x/1").unwrap(), "https://x/1");
        assert_eq!(request_key("HTTPS://X/1").unwrap(), "https://x/1");
        assert_eq!(request_key("https://x").unwrap(), "https://x/");
        assert_eq!(
            request_key("https://api.example.com/v1/rooms?id=3").unwrap(),
            "https://api.example.com/v1/rooms?id=3"
        );
    }

    #[test]
    fn test_request_key_rejects_relative() {
        let err = request_key("/rooms/3").unwrap_err();
        assert!(matches!(err, CacheError::InvalidUrl { .. }));
    }
}
