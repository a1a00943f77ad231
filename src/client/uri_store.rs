// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use anyhow::anyhow;

use super::file::FileStore;
use super::http::HttpStore;
use super::store::BlobSource;
use crate::config::ResolverConfig;
use crate::proofs::common::error::SnapshotResult;

/// Blob source that picks a backend by URI.
///
/// Mounted prefixes go to the filesystem, and so do `file://` URLs once
/// [`UriStore::with_file_urls`] enables them. Bare paths are refused: URIs come
/// from downloaded snapshot data and must not reach arbitrary local files.
#[derive(Clone, Debug)]
pub struct UriStore {
    file: FileStore,
    http: HttpStore,
    file_urls: bool,
}

impl UriStore {
    pub fn new(file: FileStore, http: HttpStore) -> Self {
        Self {
            file,
            http,
            file_urls: false,
        }
    }

    pub fn from_config(config: &ResolverConfig, file: FileStore) -> SnapshotResult<Self> {
        Ok(Self::new(file, HttpStore::from_config(config)?))
    }

    /// Serve `file://` URLs from the local filesystem
    pub fn with_file_urls(mut self, enabled: bool) -> Self {
        self.file_urls = enabled;
        self
    }
}

impl BlobSource for UriStore {
    async fn fetch(&self, uri: &str) -> SnapshotResult<Option<Vec<u8>>> {
        if self.file.is_mounted(uri) {
            return self.file.fetch(uri).await;
        }
        if uri.starts_with("file://") {
            if !self.file_urls {
                return Err(anyhow!("file URLs are not enabled: {}", uri).into());
            }
            return self.file.fetch(uri).await;
        }
        self.http.fetch(uri).await
    }
}
