// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use url::Url;

use super::store::{BlobSink, BlobSource};
use crate::proofs::common::error::{SnapshotError, SnapshotResult};

/// Local filesystem blob store.
///
/// Handles `file://` URLs and bare paths. A mount maps every URI under a prefix
/// (for example the `ipfs://<cid>` a directory will be published at) onto a local
/// directory, so artifacts can be written and read back before upload.
#[derive(Clone, Debug, Default)]
pub struct FileStore {
    mounts: Vec<(String, PathBuf)>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve URIs under `prefix` from `dir`
    pub fn mount(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        self.mounts.push((prefix, dir.into()));
        self
    }

    /// Path under a mount; `..` segments never escape the mounted directory
    fn mounted_path(&self, uri: &str) -> Option<PathBuf> {
        self.mounts.iter().find_map(|(prefix, dir)| {
            let rest = uri.strip_prefix(prefix.as_str())?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }
            if rest.split('/').any(|segment| segment == "..") {
                return None;
            }
            Some(dir.join(rest.trim_start_matches('/')))
        })
    }

    /// Whether `uri` falls under one of the mounts
    pub fn is_mounted(&self, uri: &str) -> bool {
        self.mounted_path(uri).is_some()
    }

    /// Map a URI to the local path backing it
    pub fn resolve_path(&self, uri: &str) -> SnapshotResult<PathBuf> {
        if let Some(path) = self.mounted_path(uri) {
            return Ok(path);
        }
        if uri.starts_with("file://") {
            let url = Url::parse(uri).map_err(|e| anyhow!("Invalid file URL '{}': {}", uri, e))?;
            return url
                .to_file_path()
                .map_err(|_| anyhow!("File URL '{}' has no local path", uri).into());
        }
        if !uri.contains("://") {
            return Ok(PathBuf::from(uri));
        }
        Err(anyhow!("FileStore cannot serve '{}'", uri).into())
    }
}

/// Write via a temp file and rename so readers never see a partial blob
pub async fn write_file_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, bytes).await?;
    tokio::fs::rename(&temp_path, path).await
}

impl BlobSource for FileStore {
    async fn fetch(&self, uri: &str) -> SnapshotResult<Option<Vec<u8>>> {
        let path = self.resolve_path(uri)?;
        tracing::debug!("reading {} from {}", uri, path.display());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SnapshotError::transport_with_source(
                uri,
                format!("failed to read {}", path.display()),
                e.into(),
            )),
        }
    }
}

impl BlobSink for FileStore {
    async fn put(&self, uri: &str, bytes: Vec<u8>) -> SnapshotResult<()> {
        let path = self.resolve_path(uri)?;
        tracing::debug!("writing {} bytes for {} to {}", bytes.len(), uri, path.display());
        write_file_atomic(&path, &bytes)
            .await
            .map_err(|e| SnapshotError::storage(uri, format!("{}: {}", path.display(), e)))
    }
}
