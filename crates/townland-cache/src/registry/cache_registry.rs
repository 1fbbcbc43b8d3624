//! Name → cache partition registry.

use crate::config::StorageConfig;
use crate::error::Result;
use crate::network::{DynFetcher, HttpClient};
use crate::storage::CacheStorage;
use crate::store::{DynStore, MemoryStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Registry of named [`CacheStorage`] instances sharing one store and fetcher.
///
/// Names are case-sensitive; the partitions they open are not (see
/// [`PartitionId`](crate::store::PartitionId)).
pub struct CacheRegistry {
    prefix: String,
    store: DynStore,
    fetcher: DynFetcher,
    storages: Mutex<HashMap<String, Arc<CacheStorage>>>,
}

impl CacheRegistry {
    /// Create a builder for a registry.
    pub fn builder() -> CacheRegistryBuilder {
        CacheRegistryBuilder::new()
    }

    /// Create an empty registry.
    pub fn new(store: DynStore, fetcher: DynFetcher) -> Self {
        Self {
            prefix: StorageConfig::NAMESPACE_PREFIX.to_string(),
            store,
            fetcher,
            storages: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry seeded with the default partitions.
    ///
    /// Must be called from within a Tokio runtime (the partitions start
    /// opening immediately).
    pub fn with_defaults(store: DynStore, fetcher: DynFetcher) -> Self {
        let registry = Self::new(store, fetcher);
        registry.seed_defaults();
        registry
    }

    fn seed_defaults(&self) {
        let mut storages = self.lock();
        for name in StorageConfig::DEFAULT_PARTITIONS {
            let storage = self.create(&name.to_lowercase());
            storages.insert(name.to_string(), Arc::new(storage));
        }
        debug!("Seeded {} default cache partitions", storages.len());
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<CacheStorage>>> {
        self.storages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create(&self, key: &str) -> CacheStorage {
        CacheStorage::with_prefix(
            &self.prefix,
            key,
            Arc::clone(&self.store),
            Arc::clone(&self.fetcher),
        )
    }

    /// Return the storage registered under `name`, creating and registering
    /// it if needed. Repeated calls return the same instance.
    pub fn add_cache_storage(&self, name: &str) -> Arc<CacheStorage> {
        let mut storages = self.lock();
        if let Some(existing) = storages.get(name) {
            return Arc::clone(existing);
        }

        let storage = Arc::new(self.create(name));
        storages.insert(name.to_string(), Arc::clone(&storage));
        debug!("Registered cache storage '{}' ({})", name, storage.identity());
        storage
    }

    /// Drop the mapping for `name`.
    ///
    /// The partition stays in the store; registering the name again opens
    /// the same data.
    pub fn remove_cache_storage(&self, name: &str) -> Option<Arc<CacheStorage>> {
        let removed = self.lock().remove(name);
        if removed.is_some() {
            debug!("Removed cache storage '{}'", name);
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<CacheStorage>> {
        self.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Namespace prefix used for new partitions.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Store shared by every registered partition.
    pub fn store(&self) -> &DynStore {
        &self.store
    }
}

/// Builder for configuring a [`CacheRegistry`].
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use townland_cache::{CacheRegistry, SqliteStore};
///
/// let registry = CacheRegistry::builder()
///     .store(Arc::new(SqliteStore::open_default()?))
///     .prefix("townland")
///     .build()?;
/// let rooms = registry.get("Room").expect("seeded");
/// ```
pub struct CacheRegistryBuilder {
    store: Option<DynStore>,
    fetcher: Option<DynFetcher>,
    prefix: String,
    seed_defaults: bool,
}

impl CacheRegistryBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            fetcher: None,
            prefix: StorageConfig::NAMESPACE_PREFIX.to_string(),
            seed_defaults: true,
        }
    }

    /// Store backing every partition.
    ///
    /// Default: a fresh [`MemoryStore`]
    pub fn store(mut self, store: DynStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Fetcher used on cache misses.
    ///
    /// Default: [`HttpClient::new`]
    pub fn fetcher(mut self, fetcher: DynFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Namespace prefix for partition identities.
    ///
    /// Default: `townland`
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Seed "Character", "Extera" and "Room".
    ///
    /// Default: `true`
    pub fn seed_defaults(mut self, enable: bool) -> Self {
        self.seed_defaults = enable;
        self
    }

    /// Build the registry.
    ///
    /// Must be called from within a Tokio runtime when seeding is enabled.
    pub fn build(self) -> Result<CacheRegistry> {
        let fetcher: DynFetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpClient::new()?),
        };
        let store: DynStore = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let mut registry = CacheRegistry::new(store, fetcher);
        registry.prefix = self.prefix;
        if self.seed_defaults {
            registry.seed_defaults();
        }
        Ok(registry)
    }
}

impl Default for CacheRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::network::Fetcher;
    use crate::response::CachedResponse;
    use async_trait::async_trait;

    struct NoNetwork;

    #[async_trait]
    impl Fetcher for NoNetwork {
        async fn fetch(&self, url: &str) -> Result<CachedResponse> {
            Err(CacheError::Other(format!("offline: {}", url)))
        }
    }

    fn registry() -> CacheRegistry {
        CacheRegistry::with_defaults(Arc::new(MemoryStore::new()), Arc::new(NoNetwork))
    }

    #[tokio::test]
    async fn test_seeded_with_defaults() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["Character", "Extera", "Room"]);

        let room = registry.get("Room").unwrap();
        assert_eq!(room.key(), "room");
        assert_eq!(room.identity().as_str(), "townland:room");
        assert_eq!(
            registry.get("Character").unwrap().identity().as_str(),
            "townland:character"
        );
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let registry = registry();
        let a = registry.add_cache_storage("Inventory");
        let b = registry.add_cache_storage("Inventory");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 4);

        let room = registry.add_cache_storage("Room");
        assert!(Arc::ptr_eq(&room, &registry.get("Room").unwrap()));
        assert_eq!(registry.len(), 4);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = registry();
        assert!(registry.remove_cache_storage("Extera").is_some());
        assert!(registry.remove_cache_storage("Extera").is_none());
        assert!(!registry.contains("Extera"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_builder_options() {
        let registry = CacheRegistry::builder()
            .fetcher(Arc::new(NoNetwork))
            .prefix("demo")
            .seed_defaults(false)
            .build()
            .unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.prefix(), "demo");

        let storage = registry.add_cache_storage("Room");
        assert_eq!(storage.identity().as_str(), "demo:room");
        assert!(storage.opened().await);
        assert_eq!(registry.store().partitions().await.unwrap(), vec!["demo:room"]);
    }
}
