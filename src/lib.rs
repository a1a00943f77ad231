// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

pub mod client;
pub mod config;
pub mod proofs;
pub mod types;

// Re-export main types
pub use config::{BuilderConfig, ResolverConfig};
pub use proofs::{
    AirdropEntry, ClaimProof, EntryHasher, Ineligibility, MerkleTree, ProofResolver, Resolution,
    ShardedMerkleTreeInfo, ShardedSnapshot, ShardedSnapshotBuilder, SnapshotError,
    SnapshotResult,
};
pub use types::RawEntry;
