//! One named cache partition with get-or-fetch semantics.
//!
//! A [`CacheStorage`] starts opening its Store partition as soon as it is
//! constructed. Until the partition is open:
//! - [`add`](CacheStorage::add) and [`add_all`](CacheStorage::add_all) queue
//!   their URLs; the queue is stored as one batch when the open completes
//! - [`get`](CacheStorage::get), [`keys`](CacheStorage::keys),
//!   [`has`](CacheStorage::has) and [`delete`](CacheStorage::delete) degrade to
//!   absent / empty / `false` / no-op
//! - the JSON and image paths reject with [`CacheError::StoreUnavailable`]
//!
//! Callers that would rather wait can await [`opened`](CacheStorage::opened).
//!
//! # Failure policy
//!
//! Read paths (`get`, `keys`, `has`) and `delete` never return errors: a
//! failing Store is logged at `warn` and reported as a miss. `add` and
//! `add_all` log and swallow failures. `add_json`, `get_json`, `add_image` and
//! `get_image` log and return the error. Open and clear failures are logged
//! and leave the instance [`OpenState::Unavailable`].

use crate::config::StorageConfig;
use crate::error::{CacheError, Result};
use crate::network::DynFetcher;
use crate::response::CachedResponse;
use crate::store::{request_key, DynPartition, DynStore, PartitionId};
use bytes::Bytes;
use futures::future::try_join_all;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

/// Callback run once when the partition first opens.
pub type OpenCallback = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle state of a [`CacheStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenState {
    /// Open (or clear) in progress; writes are queued.
    Opening,
    /// Partition handle available.
    Open,
    /// Open or clear failed; nothing is retried.
    Unavailable,
}

enum Slot {
    Opening { pending: Vec<String> },
    Open(DynPartition),
    Unavailable,
}

struct Shared {
    key: String,
    identity: PartitionId,
    store: DynStore,
    fetcher: DynFetcher,
    slot: Mutex<Slot>,
    on_open: Mutex<Option<OpenCallback>>,
    has_opened: AtomicBool,
    state_tx: watch::Sender<OpenState>,
    /// Held for a whole delete + reopen cycle.
    clear_lock: AsyncMutex<()>,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn partition(&self) -> Option<DynPartition> {
        match &*self.slot() {
            Slot::Open(partition) => Some(Arc::clone(partition)),
            _ => None,
        }
    }

    fn require_partition(&self) -> Result<DynPartition> {
        self.partition().ok_or_else(|| CacheError::StoreUnavailable {
            identity: self.identity.to_string(),
        })
    }

    async fn open_partition(self: Arc<Self>) {
        match self.store.open(&self.identity).await {
            Ok(partition) => {
                self.finish_open(&partition).await;
                debug!("Opened cache partition '{}'", self.identity);
            }
            Err(e) => {
                error!("Cannot open cache partition '{}': {}", self.identity, e);
                self.mark_unavailable();
            }
        }
    }

    /// Flush queued URLs, publish the handle, then notify.
    async fn finish_open(&self, partition: &DynPartition) {
        loop {
            // URLs queued while a batch is being stored land in the next batch
            let batch = {
                let mut slot = self.slot();
                let batch = match &mut *slot {
                    Slot::Opening { pending } => std::mem::take(pending),
                    _ => Vec::new(),
                };
                if batch.is_empty() {
                    *slot = Slot::Open(Arc::clone(partition));
                }
                batch
            };

            if batch.is_empty() {
                break;
            }

            let count = batch.len();
            debug!("Storing {} queued URLs in '{}'", count, self.identity);
            if let Err(e) = self.store_all(partition, batch).await {
                warn!(
                    "Failed to cache {} queued URLs in '{}': {}",
                    count, self.identity, e
                );
            }
        }

        self.state_tx.send_replace(OpenState::Open);
        self.fire_open_callback();
    }

    fn mark_unavailable(&self) {
        let dropped = {
            let mut slot = self.slot();
            let dropped = match &*slot {
                Slot::Opening { pending } => pending.len(),
                _ => 0,
            };
            *slot = Slot::Unavailable;
            dropped
        };

        if dropped > 0 {
            warn!(
                "Dropped {} queued URLs for unavailable partition '{}'",
                dropped, self.identity
            );
        }
        self.state_tx.send_replace(OpenState::Unavailable);
    }

    fn fire_open_callback(&self) {
        if self.has_opened.swap(true, Ordering::SeqCst) {
            return;
        }
        let callback = self
            .on_open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Fetch every URL, then store them in order. Nothing is stored unless
    /// every fetch succeeds.
    async fn store_all(&self, partition: &DynPartition, urls: Vec<String>) -> Result<()> {
        let responses = try_join_all(urls.iter().map(|url| self.fetcher.fetch(url))).await?;
        for (url, response) in urls.iter().zip(responses) {
            partition.put(url, response).await?;
        }
        Ok(())
    }

    async fn fetch_and_store(&self, url: &str) -> Result<CachedResponse> {
        let partition = self.require_partition()?;
        let key = request_key(url)?;
        let response = self.fetcher.fetch(&key).await?;
        partition.put(&key, response.clone()).await?;
        Ok(response)
    }
}

/// A named cache partition.
///
/// Construction spawns the open on the current Tokio runtime, so it must be
/// called from within one.
pub struct CacheStorage {
    shared: Arc<Shared>,
}

impl CacheStorage {
    /// Create a storage for `key` under the default namespace prefix.
    pub fn new(key: impl Into<String>, store: DynStore, fetcher: DynFetcher) -> Self {
        Self::with_prefix(StorageConfig::NAMESPACE_PREFIX, key, store, fetcher)
    }

    /// Create a storage for `key` under a custom namespace prefix.
    pub fn with_prefix(
        prefix: &str,
        key: impl Into<String>,
        store: DynStore,
        fetcher: DynFetcher,
    ) -> Self {
        let key = key.into();
        let identity = PartitionId::new(prefix, &key);
        let (state_tx, _) = watch::channel(OpenState::Opening);

        let shared = Arc::new(Shared {
            key,
            identity,
            store,
            fetcher,
            slot: Mutex::new(Slot::Opening {
                pending: Vec::new(),
            }),
            on_open: Mutex::new(None),
            has_opened: AtomicBool::new(false),
            state_tx,
            clear_lock: AsyncMutex::new(()),
        });

        tokio::spawn(Arc::clone(&shared).open_partition());

        Self { shared }
    }

    /// Key this storage was created with.
    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// Store identity (`prefix:key`, lowercase).
    pub fn identity(&self) -> &PartitionId {
        &self.shared.identity
    }

    pub fn state(&self) -> OpenState {
        *self.shared.state_tx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == OpenState::Open
    }

    /// Number of URLs waiting for the partition to open.
    pub fn pending_len(&self) -> usize {
        match &*self.shared.slot() {
            Slot::Opening { pending } => pending.len(),
            _ => 0,
        }
    }

    /// Register a callback for the first successful open.
    ///
    /// Replaces any previously registered callback. A callback registered
    /// after the first open never runs; use [`opened`](Self::opened) instead.
    pub fn on_open(&self, callback: impl FnOnce() + Send + 'static) {
        *self
            .shared
            .on_open
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    /// Wait until the current open or clear cycle settles.
    ///
    /// Returns `true` if the partition is open.
    pub async fn opened(&self) -> bool {
        let mut rx = self.shared.state_tx.subscribe();
        let settled = rx
            .wait_for(|state| *state != OpenState::Opening)
            .await
            .map(|state| *state);
        matches!(settled, Ok(OpenState::Open))
    }

    /// Fetch and store a URL; queued if the partition is not open yet.
    pub async fn add(&self, url: &str) {
        self.add_all([url]).await;
    }

    /// Fetch and store several URLs as one batch; queued if the partition is
    /// not open yet.
    ///
    /// Failures are logged, never returned.
    pub async fn add_all<I, S>(&self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = urls
            .into_iter()
            .filter_map(|url| match request_key(url.as_ref()) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!("Skipping URL for '{}': {}", self.shared.identity, e);
                    None
                }
            })
            .collect();
        if keys.is_empty() {
            return;
        }

        let partition = {
            let mut slot = self.shared.slot();
            match &mut *slot {
                Slot::Opening { pending } => {
                    debug!(
                        "Queued {} URLs until '{}' opens",
                        keys.len(),
                        self.shared.identity
                    );
                    pending.extend(keys);
                    return;
                }
                Slot::Open(partition) => Arc::clone(partition),
                Slot::Unavailable => {
                    warn!(
                        "Cache partition '{}' is unavailable, dropping {} URLs",
                        self.shared.identity,
                        keys.len()
                    );
                    return;
                }
            }
        };

        if let Err(e) = self.shared.store_all(&partition, keys).await {
            warn!("Failed to cache URLs in '{}': {}", self.shared.identity, e);
        }
    }

    /// Fetch a JSON resource, store it and return the response.
    pub async fn add_json(&self, url: &str) -> Result<CachedResponse> {
        self.shared.fetch_and_store(url).await.map_err(|e| {
            error!("Failed to cache json {}: {}", url, e);
            e
        })
    }

    /// Return the cached response for `url`, fetching and storing it on a miss.
    pub async fn get_json(&self, url: &str) -> Result<CachedResponse> {
        let partition = self.shared.require_partition()?;
        let key = request_key(url)?;
        if let Some(hit) = partition.lookup(&key).await? {
            debug!("Cache hit for {} in '{}'", key, self.shared.identity);
            return Ok(hit);
        }
        self.add_json(url).await
    }

    /// Fetch an image, store it and return its bytes.
    pub async fn add_image(&self, url: &str) -> Result<Bytes> {
        match self.shared.fetch_and_store(url).await {
            Ok(response) => Ok(response.blob()),
            Err(e) => {
                error!("Failed to cache image {}: {}", url, e);
                Err(e)
            }
        }
    }

    /// Return the cached image bytes for `url`, fetching and storing on a miss.
    pub async fn get_image(&self, url: &str) -> Result<Bytes> {
        let partition = self.shared.require_partition()?;
        let key = request_key(url)?;
        if let Some(hit) = partition.lookup(&key).await? {
            debug!("Cache hit for {} in '{}'", key, self.shared.identity);
            return Ok(hit.blob());
        }
        self.add_image(url).await
    }

    /// Cached response for `url`, if any. Never fetches.
    pub async fn get(&self, url: &str) -> Option<CachedResponse> {
        let partition = self.shared.partition()?;
        let key = request_key(url).ok()?;
        match partition.lookup(&key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Lookup of {} in '{}' failed: {}", key, self.shared.identity, e);
                None
            }
        }
    }

    /// Remove the entry for `url`.
    pub async fn delete(&self, url: &str) {
        let Some(partition) = self.shared.partition() else {
            return;
        };
        let Ok(key) = request_key(url) else {
            return;
        };
        if let Err(e) = partition.delete(&key).await {
            warn!("Delete of {} in '{}' failed: {}", key, self.shared.identity, e);
        }
    }

    /// Delete the whole partition and reopen it empty under the same identity.
    ///
    /// URLs added while the clear runs are queued and stored after the reopen.
    /// Concurrent clears run one after another.
    pub async fn clear(&self) {
        let _clearing = self.shared.clear_lock.lock().await;

        // Let an in-flight open settle so its flush cannot race the delete
        self.opened().await;

        let shared = &self.shared;
        {
            let mut slot = shared.slot();
            *slot = Slot::Opening {
                pending: Vec::new(),
            };
        }
        shared.state_tx.send_replace(OpenState::Opening);

        if let Err(e) = shared.store.delete(&shared.identity).await {
            error!("Cannot delete cache partition '{}': {}", shared.identity, e);
            shared.mark_unavailable();
            return;
        }

        match shared.store.open(&shared.identity).await {
            Ok(partition) => {
                shared.finish_open(&partition).await;
                info!("Cleared cache partition '{}'", shared.identity);
            }
            Err(e) => {
                error!("Cannot reopen cache partition '{}': {}", shared.identity, e);
                shared.mark_unavailable();
            }
        }
    }

    /// URLs of all cached entries, in insertion order.
    pub async fn keys(&self) -> Vec<String> {
        let Some(partition) = self.shared.partition() else {
            return Vec::new();
        };
        partition.keys().await.unwrap_or_else(|e| {
            warn!("Listing '{}' failed: {}", self.shared.identity, e);
            Vec::new()
        })
    }

    /// Whether `url` is cached.
    pub async fn has(&self, url: &str) -> bool {
        self.get(url).await.is_some()
    }
}

impl fmt::Debug for CacheStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStorage")
            .field("key", &self.shared.key)
            .field("identity", &self.shared.identity)
            .field("state", &self.state())
            .finish()
    }
}
