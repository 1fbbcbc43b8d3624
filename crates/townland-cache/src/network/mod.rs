//! Network fetching for cache misses.
//!
//! This module provides:
//! - The [`Fetcher`] trait the cache uses to load resources
//! - [`HttpClient`], a reqwest-backed fetcher

mod client;

pub use client::HttpClient;

use crate::error::Result;
use crate::response::CachedResponse;
use async_trait::async_trait;
use std::sync::Arc;

/// Loads a resource over the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`.
    ///
    /// Transport failures and non-success statuses are both errors.
    async fn fetch(&self, url: &str) -> Result<CachedResponse>;
}

/// Shared fetcher handle.
pub type DynFetcher = Arc<dyn Fetcher>;
