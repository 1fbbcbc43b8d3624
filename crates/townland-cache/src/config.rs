//! Centralized configuration for the cache.
//!
//! Constants for partition naming, on-disk locations and network behavior.
//! Runtime choices (store, fetcher, prefix) go through
//! [`CacheRegistryBuilder`](crate::registry::CacheRegistryBuilder).

use std::time::Duration;

/// Partition naming and storage locations.
pub struct StorageConfig;

impl StorageConfig {
    /// Namespace prefix of every partition identity (`prefix:key`).
    pub const NAMESPACE_PREFIX: &'static str = "townland";
    /// Logical names seeded into a default registry.
    pub const DEFAULT_PARTITIONS: [&'static str; 3] = ["Character", "Extera", "Room"];
    /// Directory under the platform cache dir used by the SQLite store.
    pub const APP_DIR_NAME: &'static str = "townland";
    pub const DATABASE_FILENAME: &'static str = "cache.sqlite";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const USER_AGENT: &'static str = "Townland-Cache/0.1";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_partitions_are_distinct_case_insensitively() {
        let mut lowered: Vec<String> = StorageConfig::DEFAULT_PARTITIONS
            .iter()
            .map(|name| name.to_lowercase())
            .collect();
        lowered.sort();
        lowered.dedup();
        assert_eq!(lowered.len(), StorageConfig::DEFAULT_PARTITIONS.len());
    }

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(NetworkConfig::REQUEST_TIMEOUT > Duration::ZERO);
    }
}
