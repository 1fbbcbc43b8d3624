//! Partitioned blob store that cache partitions are kept in.
//!
//! Provides:
//! - [`CacheStore`] / [`CachePartition`] traits the cache talks to
//! - [`MemoryStore`], an in-process backend
//! - [`SqliteStore`], a persistent backend sharing one SQLite database
//!   across partitions

mod identity;
mod memory;
mod sqlite;
mod traits;

pub use identity::{request_key, PartitionId};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CachePartition, CacheStore, DynPartition, DynStore};
