// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::store::{BlobSink, BlobSource};
use crate::proofs::common::error::SnapshotResult;

/// Fetched blobs by URI. `None` records a definitive absence.
pub type BlobCache = Arc<Mutex<HashMap<String, Option<Vec<u8>>>>>;

/// Cached wrapper around a blob source that eliminates duplicate downloads.
///
/// Published artifacts are write-once, so entries never need invalidation.
/// Errors are not cached.
pub struct CachedStore<S> {
    inner: S,
    cache: BlobCache,
}

impl<S> CachedStore<S> {
    /// Create a new cached store with its own cache
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a cached store that shares a cache with other instances
    pub fn with_shared_cache(inner: S, cache: BlobCache) -> Self {
        Self { inner, cache }
    }

    /// Get the shared cache for reuse in other stores
    pub fn shared_cache(&self) -> BlobCache {
        self.cache.clone()
    }

    /// Get cache statistics as (entries, bytes)
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.lock();
        let entries = cache.len();
        let bytes: usize = cache.values().flatten().map(|v| v.len()).sum();
        (entries, bytes)
    }

    /// Clear the cache to free memory
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: BlobSource + Sync> BlobSource for CachedStore<S> {
    async fn fetch(&self, uri: &str) -> SnapshotResult<Option<Vec<u8>>> {
        let cached = self.cache.lock().get(uri).cloned();
        if let Some(hit) = cached {
            tracing::debug!("cache hit for {}", uri);
            return Ok(hit);
        }

        let data = self.inner.fetch(uri).await?;
        self.cache.lock().insert(uri.to_string(), data.clone());
        Ok(data)
    }
}

impl<S: BlobSink + Sync> BlobSink for CachedStore<S> {
    async fn put(&self, uri: &str, bytes: Vec<u8>) -> SnapshotResult<()> {
        self.inner.put(uri, bytes.clone()).await?;
        self.cache.lock().insert(uri.to_string(), Some(bytes));
        Ok(())
    }
}
