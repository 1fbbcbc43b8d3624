//! Townland Cache - named cache partitions for network-fetched resources.
//!
//! Responses (generic requests, JSON API responses, images) are kept in named
//! partitions of a Store. A miss falls back to a network fetch and stores the
//! result, so repeated reads of the same URL stay local.
//!
//! - [`CacheStorage`]: one partition with get-or-fetch operations
//! - [`CacheRegistry`]: named partitions, seeded with "Character", "Extera"
//!   and "Room"
//! - [`store`]: the Store traits plus in-memory and SQLite backends
//! - [`network`]: the fetcher trait and a reqwest-backed client
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use townland_cache::{CacheRegistry, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> townland_cache::Result<()> {
//!     let registry = CacheRegistry::builder()
//!         .store(Arc::new(SqliteStore::open_default()?))
//!         .build()?;
//!
//!     let characters = registry.add_cache_storage("Character");
//!     characters.opened().await;
//!
//!     let profile = characters.get_json("https://api.example.com/characters/7").await?;
//!     println!("{} bytes", profile.body.len());
//!
//!     let portrait = characters.get_image("https://cdn.example.com/7.png").await?;
//!     println!("{} image bytes", portrait.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod network;
pub mod registry;
pub mod response;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use config::{NetworkConfig, StorageConfig};
pub use error::{CacheError, ErrorCategory, Result};
pub use network::{DynFetcher, Fetcher, HttpClient};
pub use registry::{CacheRegistry, CacheRegistryBuilder};
pub use response::CachedResponse;
pub use storage::{CacheStorage, OpenCallback, OpenState};
pub use store::{
    CachePartition, CacheStore, DynPartition, DynStore, MemoryStore, PartitionId, SqliteStore,
};
