//! Named cache partitions.

mod cache_storage;

pub use cache_storage::{CacheStorage, OpenCallback, OpenState};
