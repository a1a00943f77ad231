// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::proofs::common::error::SnapshotResult;

/// Read side of blob storage.
///
/// `Ok(None)` means the blob definitively does not exist (a 404, a missing file).
/// Anything that prevents a definitive answer is an `Err`.
pub trait BlobSource {
    fn fetch(&self, uri: &str) -> impl Future<Output = SnapshotResult<Option<Vec<u8>>>> + Send;
}

/// Write side of blob storage
pub trait BlobSink {
    fn put(&self, uri: &str, bytes: Vec<u8>) -> impl Future<Output = SnapshotResult<()>> + Send;
}

/// In-process blob store keyed by URI. Clones share the same contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.blobs.write().insert(uri.into(), bytes.into());
    }

    pub fn get(&self, uri: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(uri).cloned()
    }

    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.blobs.read().keys().cloned().collect();
        uris.sort();
        uris
    }
}

impl BlobSource for MemoryStore {
    async fn fetch(&self, uri: &str) -> SnapshotResult<Option<Vec<u8>>> {
        Ok(self.get(uri))
    }
}

impl BlobSink for MemoryStore {
    async fn put(&self, uri: &str, bytes: Vec<u8>) -> SnapshotResult<()> {
        self.insert(uri, bytes);
        Ok(())
    }
}
