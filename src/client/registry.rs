// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use ethereum_types::H256;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::file::write_file_atomic;
use crate::proofs::common::error::{SnapshotError, SnapshotResult};

/// Registry key for a root: lowercase `0x`-prefixed hex
pub fn root_key(root: &H256) -> String {
    format!("0x{}", hex::encode(root.as_bytes()))
}

/// Contract metadata mapping published roots to snapshot URIs
pub trait MetadataRegistry {
    fn snapshot_uri(
        &self,
        root: &H256,
    ) -> impl Future<Output = SnapshotResult<Option<String>>> + Send;

    fn register(
        &self,
        root: &H256,
        snapshot_uri: &str,
    ) -> impl Future<Output = SnapshotResult<()>> + Send;
}

/// Registry held in memory. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRegistry {
    merkle: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataRegistry for InMemoryRegistry {
    async fn snapshot_uri(&self, root: &H256) -> SnapshotResult<Option<String>> {
        Ok(self.merkle.read().get(&root_key(root)).cloned())
    }

    async fn register(&self, root: &H256, snapshot_uri: &str) -> SnapshotResult<()> {
        self.merkle
            .write()
            .insert(root_key(root), snapshot_uri.to_string());
        Ok(())
    }
}

/// Contract metadata document on disk: `{"merkle": {"0x<root>": "<uri>"}, ...}`.
///
/// Fields other than `merkle` are preserved on write. Keys are matched
/// case-insensitively.
#[derive(Clone, Debug)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> SnapshotResult<Map<String, Value>> {
        let uri = self.path.display().to_string();
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(SnapshotError::transport_with_source(
                    uri,
                    "failed to read metadata",
                    e.into(),
                ))
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(doc)) => Ok(doc),
            Ok(_) => Err(SnapshotError::corrupt(uri, "metadata is not a JSON object")),
            Err(e) => Err(SnapshotError::corrupt(uri, format!("invalid metadata: {}", e))),
        }
    }
}

impl MetadataRegistry for FileRegistry {
    async fn snapshot_uri(&self, root: &H256) -> SnapshotResult<Option<String>> {
        let doc = self.load().await?;
        let key = root_key(root);

        let Some(merkle) = doc.get("merkle") else {
            return Ok(None);
        };
        let merkle = merkle.as_object().ok_or_else(|| {
            SnapshotError::corrupt(self.path.display().to_string(), "merkle is not an object")
        })?;

        for (k, v) in merkle {
            if k.eq_ignore_ascii_case(&key) {
                return v.as_str().map(|s| Some(s.to_string())).ok_or_else(|| {
                    SnapshotError::corrupt(
                        self.path.display().to_string(),
                        format!("snapshot uri for {} is not a string", k),
                    )
                });
            }
        }
        Ok(None)
    }

    async fn register(&self, root: &H256, snapshot_uri: &str) -> SnapshotResult<()> {
        let mut doc = self.load().await?;
        let key = root_key(root);

        let merkle = doc
            .entry("merkle")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| anyhow!("metadata field 'merkle' is not an object"))?;
        merkle.retain(|k, _| !k.eq_ignore_ascii_case(&key));
        merkle.insert(key, Value::String(snapshot_uri.to_string()));

        let bytes = serde_json::to_vec_pretty(&Value::Object(doc)).map_err(anyhow::Error::from)?;
        write_file_atomic(&self.path, &bytes)
            .await
            .map_err(|e| SnapshotError::storage(self.path.display().to_string(), e.to_string()))
    }
}
