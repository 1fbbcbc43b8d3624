//! Registry of named cache partitions.
//!
//! A [`CacheRegistry`] maps logical names ("Character", "Extera", "Room", ...)
//! to shared [`CacheStorage`](crate::CacheStorage) instances. It is an
//! explicit object: create one at startup and pass it to whatever needs it.
//! The registry itself is not persisted; the partitions it points at live in
//! the Store and outlive removal from the registry.

mod cache_registry;

pub use cache_registry::{CacheRegistry, CacheRegistryBuilder};
