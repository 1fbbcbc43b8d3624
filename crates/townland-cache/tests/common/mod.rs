//! Shared fakes for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;
use townland_cache::{
    CacheError, CacheStore, CachedResponse, DynPartition, Fetcher, MemoryStore, PartitionId,
    Result,
};

/// Fetcher that records every request and never touches the network.
///
/// URLs containing `/missing` answer 404; `.png` URLs return PNG magic bytes;
/// everything else returns a small JSON document naming the URL.
#[derive(Default)]
pub struct CountingFetcher {
    calls: Mutex<Vec<String>>,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| called.as_str() == url)
            .count()
    }
}

pub const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<CachedResponse> {
        self.calls.lock().unwrap().push(url.to_string());

        if url.contains("/missing") {
            return Err(CacheError::HttpStatus {
                url: url.to_string(),
                status: 404,
            });
        }

        if url.ends_with(".png") {
            return Ok(CachedResponse::new(url, PNG_MAGIC.to_vec())
                .with_header("Content-Type", "image/png"));
        }

        let body = serde_json::json!({ "url": url }).to_string();
        Ok(CachedResponse::new(url, body).with_header("Content-Type", "application/json"))
    }
}

/// Memory store whose `open` blocks until [`release`](Self::release) is called.
///
/// Opens and deletes can also be made to fail.
pub struct GatedStore {
    inner: MemoryStore,
    gate: watch::Sender<bool>,
    fail_open: AtomicBool,
    fail_delete: AtomicBool,
}

impl GatedStore {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner: MemoryStore::new(),
            gate,
            fail_open: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    /// Store that opens immediately.
    pub fn released() -> Self {
        let store = Self::new();
        store.release();
        store
    }

    /// Let pending and future opens through.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Hold future opens until the next [`release`](Self::release).
    pub fn close(&self) {
        self.gate.send_replace(false);
    }

    pub fn fail_opens(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for GatedStore {
    async fn open(&self, id: &PartitionId) -> Result<DynPartition> {
        let mut rx = self.gate.subscribe();
        rx.wait_for(|released| *released)
            .await
            .map_err(|e| CacheError::Other(e.to_string()))?;
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(CacheError::StoreOpen {
                identity: id.to_string(),
                message: "open refused".to_string(),
            });
        }
        self.inner.open(id).await
    }

    async fn delete(&self, id: &PartitionId) -> Result<bool> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(CacheError::Other(format!("cannot delete {}", id)));
        }
        self.inner.delete(id).await
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        self.inner.partitions().await
    }
}
