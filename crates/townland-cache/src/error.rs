//! Error types for the cache.
//!
//! Every fallible operation in the crate returns [`CacheError`]. The variants
//! group into three failure families (see [`ErrorCategory`]): the partition
//! never opened, the network fetch failed, or the Store itself failed.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    // Partition lifecycle errors
    #[error("Cache partition {identity} is not open")]
    StoreUnavailable { identity: String },

    #[error("Failed to open cache partition {identity}: {message}")]
    StoreOpen { identity: String, message: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Coarse failure family of a [`CacheError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The partition never reached the open state.
    StoreUnavailable,
    /// The network request failed or returned a non-success status.
    FetchFailure,
    /// A read or write against an open Store failed.
    StoreFailure,
    /// Anything else (bad input, serialization).
    Other,
}

// Conversion implementations for common error types

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl CacheError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CacheError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Map this error to its failure family.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CacheError::StoreUnavailable { .. } | CacheError::StoreOpen { .. } => {
                ErrorCategory::StoreUnavailable
            }

            CacheError::Network { .. }
            | CacheError::Timeout(_)
            | CacheError::HttpStatus { .. } => ErrorCategory::FetchFailure,

            CacheError::Database { .. } | CacheError::Io { .. } => ErrorCategory::StoreFailure,

            CacheError::Json { .. } | CacheError::InvalidUrl { .. } | CacheError::Other(_) => {
                ErrorCategory::Other
            }
        }
    }

    /// True when the error came from the network side of a get-or-fetch.
    pub fn is_fetch_failure(&self) -> bool {
        self.category() == ErrorCategory::FetchFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::StoreUnavailable {
            identity: "townland:room".into(),
        };
        assert_eq!(err.to_string(), "Cache partition townland:room is not open");

        let err = CacheError::HttpStatus {
            url: "https://x/1".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 fetching https://x/1");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            CacheError::StoreUnavailable {
                identity: "townland:room".into()
            }
            .category(),
            ErrorCategory::StoreUnavailable
        );
        assert!(CacheError::Timeout(std::time::Duration::from_secs(5)).is_fetch_failure());
        assert_eq!(
            CacheError::Database {
                message: "locked".into(),
                source: None
            }
            .category(),
            ErrorCategory::StoreFailure
        );
        assert!(!CacheError::Other("x".into()).is_fetch_failure());
    }

    #[test]
    fn test_io_conversion_keeps_source() {
        let err: CacheError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, CacheError::Io { source: Some(_), .. }));
        assert_eq!(err.category(), ErrorCategory::StoreFailure);
    }
}
