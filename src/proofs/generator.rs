// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use anyhow::Context;
use ethereum_types::{H160, H256};
use futures::{StreamExt, TryStreamExt};
use rayon::prelude::*;

use crate::client::{BlobSink, MetadataRegistry};
use crate::config::BuilderConfig;
use crate::proofs::bundle::{ShardFile, ShardedMerkleTreeInfo};
use crate::proofs::common::entry::AirdropEntry;
use crate::proofs::common::error::{SnapshotError, SnapshotResult};
use crate::proofs::common::merkle::MerkleTree;
use crate::proofs::shard::{choose_shard_nybbles, shard_id, shard_uri, validate_shard_nybbles};
use crate::types::RawEntry;

/// Concurrent shard uploads during publish
const PUBLISH_CONCURRENCY: usize = 16;

/// Partitions entries into address-prefix shards and commits them under one root
#[derive(Debug, Clone, Default)]
pub struct ShardedSnapshotBuilder {
    config: BuilderConfig,
}

/// A built snapshot, ready to publish
#[derive(Debug, Clone)]
pub struct ShardedSnapshot {
    pub merkle_root: H256,
    pub shard_nybbles: u8,
    /// Non-empty shards by ascending shard id
    pub shards: BTreeMap<String, ShardFile>,
    pub entry_count: usize,
}

impl ShardedSnapshotBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// Validate raw input entries, then build.
    ///
    /// The first malformed entry aborts the whole build.
    pub fn build_raw(&self, raw: Vec<RawEntry>) -> SnapshotResult<ShardedSnapshot> {
        let entries = raw
            .into_iter()
            .enumerate()
            .map(|(index, raw)| AirdropEntry::from_raw(index, raw))
            .collect::<SnapshotResult<Vec<_>>>()?;
        self.build(entries)
    }

    pub fn build(&self, entries: Vec<AirdropEntry>) -> SnapshotResult<ShardedSnapshot> {
        if entries.is_empty() {
            return Err(SnapshotError::EmptyTree);
        }

        let shard_nybbles = match self.config.shard_nybbles {
            Some(n) => validate_shard_nybbles(n)?,
            None => choose_shard_nybbles(&entries, self.config.max_shard_size),
        };
        let entry_count = entries.len();

        // Step 1: Partition by address prefix, keeping input order within a shard
        let mut buckets: BTreeMap<String, Vec<AirdropEntry>> = BTreeMap::new();
        for entry in entries {
            buckets
                .entry(shard_id(&entry.recipient(), shard_nybbles))
                .or_default()
                .push(entry);
        }
        tracing::info!(
            entries = entry_count,
            shards = buckets.len(),
            shard_nybbles,
            "partitioned entries"
        );

        // Step 2: Build every shard tree independently
        let built: Vec<(String, Vec<AirdropEntry>, H256)> = buckets
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(id, entries)| {
                let leaves = entries.iter().map(AirdropEntry::leaf).collect();
                let root = MerkleTree::build(leaves).root()?;
                Ok((id, entries, root))
            })
            .collect::<SnapshotResult<Vec<_>>>()?;

        // Step 3: Top tree over shard roots in ascending shard id order
        let top = MerkleTree::build(built.iter().map(|(_, _, root)| *root).collect());
        let merkle_root = top.root()?;

        // Step 4: Attach each shard's path to the global root
        let mut shards = BTreeMap::new();
        for (id, entries, shard_root) in built {
            let proofs = top.proof(&shard_root)?;
            shards.insert(id, ShardFile { entries, proofs });
        }

        tracing::info!(root = ?merkle_root, "built sharded snapshot");
        Ok(ShardedSnapshot {
            merkle_root,
            shard_nybbles,
            shards,
            entry_count,
        })
    }
}

impl ShardedSnapshot {
    /// The info blob describing this snapshot at `base_uri`
    pub fn info(&self, base_uri: &str) -> ShardedMerkleTreeInfo {
        ShardedMerkleTreeInfo {
            merkle_root: Some(self.merkle_root),
            shard_nybbles: self.shard_nybbles,
            base_uri: base_uri.to_string(),
            is_sharded_merkle_tree: true,
        }
    }

    /// The shard an address falls into, if it was materialized
    pub fn shard_for(&self, address: &H160) -> Option<&ShardFile> {
        self.shards.get(&shard_id(address, self.shard_nybbles))
    }

    pub fn largest_shard(&self) -> usize {
        self.shards
            .values()
            .map(|s| s.entries.len())
            .max()
            .unwrap_or(0)
    }

    /// Write all artifacts, then register the root.
    ///
    /// Shards go first, then the info blob, then the registry entry, so the
    /// snapshot only becomes discoverable once everything it points to exists.
    /// Any write failure aborts before registration and is returned to the caller.
    pub async fn publish<S, R>(
        &self,
        sink: &S,
        registry: &R,
        base_uri: &str,
        snapshot_uri: &str,
    ) -> SnapshotResult<ShardedMerkleTreeInfo>
    where
        S: BlobSink + Sync,
        R: MetadataRegistry + Sync,
    {
        let mut uploads = Vec::with_capacity(self.shards.len());
        for (id, shard) in &self.shards {
            let bytes = serde_json::to_vec(shard)
                .with_context(|| format!("Failed to serialize shard {}", id))?;
            uploads.push((shard_uri(base_uri, id), bytes));
        }

        futures::stream::iter(uploads)
            .map(|(uri, bytes)| async move {
                tracing::debug!("publishing {}", uri);
                sink.put(&uri, bytes).await
            })
            .buffer_unordered(PUBLISH_CONCURRENCY)
            .try_collect::<Vec<()>>()
            .await?;
        tracing::info!("published {} shard files under {}", self.shards.len(), base_uri);

        let info = self.info(base_uri);
        let bytes = serde_json::to_vec_pretty(&info).context("Failed to serialize snapshot info")?;
        sink.put(snapshot_uri, bytes).await?;

        registry.register(&self.merkle_root, snapshot_uri).await?;
        tracing::info!(root = ?self.merkle_root, "registered snapshot at {}", snapshot_uri);

        Ok(info)
    }
}
