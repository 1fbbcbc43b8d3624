//! In-process store.
//!
//! Keeps partitions in memory for the lifetime of the process. Clones share
//! the same data, so a `MemoryStore` handed to several registries behaves like
//! one store.

use super::identity::PartitionId;
use super::traits::{CachePartition, CacheStore, DynPartition};
use crate::error::{CacheError, Result};
use crate::response::CachedResponse;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// In-memory store backend.
#[derive(Clone, Default)]
pub struct MemoryStore {
    partitions: Arc<Mutex<HashMap<String, Arc<MemoryPartition>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<MemoryPartition>>>> {
        self.partitions
            .lock()
            .map_err(|e| CacheError::Other(format!("Failed to lock memory store: {}", e)))
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, id: &PartitionId) -> Result<DynPartition> {
        let mut partitions = self.lock()?;
        let partition = partitions
            .entry(id.as_str().to_string())
            .or_insert_with(|| {
                debug!("Created memory partition '{}'", id);
                Arc::new(MemoryPartition {
                    id: id.clone(),
                    entries: Mutex::new(Vec::new()),
                })
            })
            .clone();
        Ok(partition)
    }

    async fn delete(&self, id: &PartitionId) -> Result<bool> {
        Ok(self.lock()?.remove(id.as_str()).is_some())
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// One in-memory partition. Entries keep insertion order.
struct MemoryPartition {
    id: PartitionId,
    entries: Mutex<Vec<(String, CachedResponse)>>,
}

impl MemoryPartition {
    fn lock(&self) -> Result<MutexGuard<'_, Vec<(String, CachedResponse)>>> {
        self.entries.lock().map_err(|e| {
            CacheError::Other(format!("Failed to lock partition {}: {}", self.id, e))
        })
    }
}

#[async_trait]
impl CachePartition for MemoryPartition {
    fn id(&self) -> &PartitionId {
        &self.id
    }

    async fn put(&self, url: &str, response: CachedResponse) -> Result<()> {
        let mut entries = self.lock()?;
        match entries.iter().position(|(key, _)| key == url) {
            Some(index) => entries[index].1 = response,
            None => entries.push((url.to_string(), response)),
        }
        Ok(())
    }

    async fn lookup(&self, url: &str) -> Result<Option<CachedResponse>> {
        Ok(self
            .lock()?
            .iter()
            .find(|(key, _)| key == url)
            .map(|(_, response)| response.clone()))
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|(key, _)| key != url);
        Ok(entries.len() != before)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.iter().map(|(key, _)| key.clone()).collect())
    }
}
