//! Store traits.
//!
//! The Store is an asynchronous partitioned blob store. The cache never looks
//! inside it: it opens and deletes partitions by identity and, inside an open
//! partition, puts, matches, deletes and lists entries keyed by URL.

use super::identity::PartitionId;
use crate::error::Result;
use crate::response::CachedResponse;
use async_trait::async_trait;
use std::sync::Arc;

/// Partitioned store that cache partitions live in.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open the partition with the given identity, creating it if needed.
    async fn open(&self, id: &PartitionId) -> Result<DynPartition>;

    /// Delete a partition and all its entries.
    ///
    /// Returns `true` if the partition existed.
    async fn delete(&self, id: &PartitionId) -> Result<bool>;

    /// Identities of all existing partitions.
    async fn partitions(&self) -> Result<Vec<String>>;
}

/// Handle to one open partition.
#[async_trait]
pub trait CachePartition: Send + Sync {
    /// Identity this handle was opened with.
    fn id(&self) -> &PartitionId;

    /// Store a response under `url`, replacing any existing entry.
    ///
    /// A replaced entry keeps its position in [`keys`](Self::keys).
    async fn put(&self, url: &str, response: CachedResponse) -> Result<()>;

    /// Look up the response stored under `url`.
    async fn lookup(&self, url: &str) -> Result<Option<CachedResponse>>;

    /// Remove the entry stored under `url`.
    ///
    /// Returns `true` if an entry was removed.
    async fn delete(&self, url: &str) -> Result<bool>;

    /// URLs of all entries, in insertion order.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Shared store handle.
pub type DynStore = Arc<dyn CacheStore>;

/// Shared partition handle.
pub type DynPartition = Arc<dyn CachePartition>;
