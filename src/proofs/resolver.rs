// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use ethereum_types::{H160, H256, U256};
use futures::{StreamExt, TryStreamExt};
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::client::{BlobSource, MetadataRegistry};
use crate::config::ResolverConfig;
use crate::proofs::bundle::{ClaimProof, ShardFile, ShardedMerkleTreeInfo};
use crate::proofs::common::entry::AirdropEntry;
use crate::proofs::common::error::{SnapshotError, SnapshotResult};
use crate::proofs::common::merkle::MerkleTree;
use crate::proofs::shard::{shard_id, shard_uri};

/// Why a recipient has no claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligibility {
    /// The registry has no snapshot for this root
    UnknownRoot,
    /// No shard file exists for the recipient's prefix
    ShardMissing { uri: String },
    /// The shard download failed and the caller asked to fail open
    ShardUnavailable { uri: String, reason: String },
    /// The shard exists but holds no matching entry
    RecipientMissing,
}

/// Outcome of a resolution that reached a definitive answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Eligible(ClaimProof),
    NotEligible(Ineligibility),
}

impl Resolution {
    pub fn into_claim(self) -> Option<ClaimProof> {
        match self {
            Self::Eligible(claim) => Some(claim),
            Self::NotEligible(_) => None,
        }
    }
}

/// A downloaded shard with its rebuilt tree, ready to serve many recipients
struct LoadedShard {
    file: ShardFile,
    tree: MerkleTree,
    by_recipient: HashMap<H160, Vec<usize>>,
}

impl LoadedShard {
    fn new(file: ShardFile) -> Self {
        let tree = MerkleTree::build(file.entries.iter().map(AirdropEntry::leaf).collect());
        let mut by_recipient: HashMap<H160, Vec<usize>> = HashMap::new();
        for (i, entry) in file.entries.iter().enumerate() {
            by_recipient.entry(entry.recipient()).or_default().push(i);
        }
        Self {
            file,
            tree,
            by_recipient,
        }
    }

    fn find(&self, recipient: &H160, token_id: Option<U256>) -> Option<&AirdropEntry> {
        self.by_recipient
            .get(recipient)?
            .iter()
            .map(|&i| &self.file.entries[i])
            .find(|entry| token_id.map_or(true, |t| entry.token_id() == t))
    }

    /// Local path ++ shard path, bottom-up
    fn claim(&self, entry: &AirdropEntry) -> SnapshotResult<ClaimProof> {
        let mut proof = self.tree.proof(&entry.leaf())?;
        proof.extend_from_slice(&self.file.proofs);
        Ok(ClaimProof {
            proof,
            entry: entry.clone(),
        })
    }
}

/// Shared slot for one load; concurrent callers wait on the first loader
type LoadSlot<T> = Arc<OnceCell<T>>;

/// Rebuilds claim proofs for single recipients from the published artifacts.
///
/// Each resolution downloads the snapshot info and one shard file. Both are kept
/// in caches owned by the resolver, so a batch of recipients in the same prefix
/// range costs one download and one tree build, even when resolved concurrently.
pub struct ProofResolver<S, R> {
    store: S,
    registry: R,
    config: ResolverConfig,
    infos: Mutex<HashMap<H256, LoadSlot<Arc<ShardedMerkleTreeInfo>>>>,
    shards: Mutex<HashMap<String, LoadSlot<Option<Arc<LoadedShard>>>>>,
}

impl<S, R> ProofResolver<S, R>
where
    S: BlobSource + Sync,
    R: MetadataRegistry + Sync,
{
    pub fn new(store: S, registry: R) -> Self {
        Self::with_config(store, registry, ResolverConfig::default())
    }

    pub fn with_config(store: S, registry: R, config: ResolverConfig) -> Self {
        Self {
            store,
            registry,
            config,
            infos: Mutex::new(HashMap::new()),
            shards: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve a claim for `recipient`.
    ///
    /// Absence of any kind is `Ok(None)`. Transport failures and corrupt
    /// artifacts are errors.
    pub async fn resolve(
        &self,
        root: &H256,
        recipient: &H160,
    ) -> SnapshotResult<Option<ClaimProof>> {
        Ok(self
            .resolve_detailed(root, recipient, None, false)
            .await?
            .into_claim())
    }

    /// Like [`Self::resolve`], but the entry must also carry `token_id`
    pub async fn resolve_token(
        &self,
        root: &H256,
        recipient: &H160,
        token_id: U256,
    ) -> SnapshotResult<Option<ClaimProof>> {
        Ok(self
            .resolve_detailed(root, recipient, Some(token_id), false)
            .await?
            .into_claim())
    }

    /// Fail-open resolution: a failed shard download reads as "not eligible".
    ///
    /// Meant for interactive callers that must not block on the network.
    /// Corrupt artifacts and registry or info failures are still errors.
    pub async fn resolve_lenient(
        &self,
        root: &H256,
        recipient: &H160,
    ) -> SnapshotResult<Option<ClaimProof>> {
        Ok(self
            .resolve_detailed(root, recipient, None, true)
            .await?
            .into_claim())
    }

    /// Resolve many recipients against one root; results keep input order
    pub async fn resolve_many(
        &self,
        root: &H256,
        recipients: &[H160],
    ) -> SnapshotResult<Vec<Option<ClaimProof>>> {
        futures::stream::iter(recipients)
            .map(|recipient| self.resolve(root, recipient))
            .buffered(self.config.max_concurrency.max(1))
            .try_collect()
            .await
    }

    /// Full resolution with the reason for any absence
    pub async fn resolve_detailed(
        &self,
        root: &H256,
        recipient: &H160,
        token_id: Option<U256>,
        fail_open: bool,
    ) -> SnapshotResult<Resolution> {
        // Step 1-2: Registry lookup and snapshot info
        let Some(info) = self.snapshot_info(root).await? else {
            tracing::debug!(?root, "root not registered");
            return Ok(Resolution::NotEligible(Ineligibility::UnknownRoot));
        };

        // Step 3-4: Locate and load the recipient's shard
        let id = shard_id(recipient, info.shard_nybbles);
        let uri = shard_uri(&info.base_uri, &id);
        let shard = match self.load_shard(&uri, &id, info.shard_nybbles).await {
            Ok(Some(shard)) => shard,
            Ok(None) => {
                tracing::debug!("no shard file at {}", uri);
                return Ok(Resolution::NotEligible(Ineligibility::ShardMissing { uri }));
            }
            Err(e @ SnapshotError::Transport { .. }) if fail_open => {
                tracing::warn!("treating unavailable shard {} as not eligible: {}", uri, e);
                return Ok(Resolution::NotEligible(Ineligibility::ShardUnavailable {
                    uri,
                    reason: e.to_string(),
                }));
            }
            Err(e) => return Err(e),
        };

        // Step 5-8: Match the entry and join the local and shard paths
        let Some(entry) = shard.find(recipient, token_id) else {
            tracing::debug!(?recipient, "recipient not in shard {}", id);
            return Ok(Resolution::NotEligible(Ineligibility::RecipientMissing));
        };
        let claim = shard.claim(entry)?;
        if !claim.verify(root) {
            return Err(SnapshotError::corrupt(uri, "proof does not reach root"));
        }
        Ok(Resolution::Eligible(claim))
    }

    async fn snapshot_info(&self, root: &H256) -> SnapshotResult<Option<Arc<ShardedMerkleTreeInfo>>> {
        let slot = self.infos.lock().get(root).cloned();
        if let Some(info) = slot.as_ref().and_then(|s| s.get()) {
            return Ok(Some(info.clone()));
        }

        // Unknown roots are not cached; they may be registered later
        let Some(snapshot_uri) = self.registry.snapshot_uri(root).await? else {
            return Ok(None);
        };
        let slot = slot.unwrap_or_else(|| self.infos.lock().entry(*root).or_default().clone());

        let info = slot
            .get_or_try_init(|| async {
                let bytes = self.store.fetch(&snapshot_uri).await?.ok_or_else(|| {
                    SnapshotError::corrupt(&snapshot_uri, "registered snapshot info is missing")
                })?;
                let info = ShardedMerkleTreeInfo::from_json(&snapshot_uri, &bytes, root)?;
                tracing::debug!(
                    ?root,
                    shard_nybbles = info.shard_nybbles,
                    "loaded snapshot info from {}",
                    snapshot_uri
                );
                Ok::<_, SnapshotError>(Arc::new(info))
            })
            .await?;
        Ok(Some(info.clone()))
    }

    /// Load a shard once per URI. Absence is cached; errors leave the slot empty.
    async fn load_shard(
        &self,
        uri: &str,
        id: &str,
        nybbles: u8,
    ) -> SnapshotResult<Option<Arc<LoadedShard>>> {
        let slot = self
            .shards
            .lock()
            .entry(uri.to_string())
            .or_default()
            .clone();

        let loaded = slot
            .get_or_try_init(|| async {
                let loaded = match self.store.fetch(uri).await? {
                    Some(bytes) => {
                        let file = ShardFile::from_json(uri, &bytes, id, nybbles)?;
                        tracing::debug!("loaded shard {} with {} entries", id, file.entries.len());
                        Some(Arc::new(LoadedShard::new(file)))
                    }
                    None => None,
                };
                Ok::<_, SnapshotError>(loaded)
            })
            .await?;
        Ok(loaded.clone())
    }

    /// Get cache statistics as (snapshot infos, shards)
    pub fn cache_stats(&self) -> (usize, usize) {
        let infos = self.infos.lock().values().filter(|s| s.initialized()).count();
        let shards = self.shards.lock().values().filter(|s| s.initialized()).count();
        (infos, shards)
    }

    /// Drop all cached infos and shards
    pub fn clear_cache(&self) {
        self.infos.lock().clear();
        self.shards.lock().clear();
    }
}
