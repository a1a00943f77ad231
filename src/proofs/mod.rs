pub mod bundle;
pub mod common;
pub mod generator;
pub mod resolver;
pub mod shard;

// Re-export unified API
pub use bundle::{ClaimProof, ShardFile, ShardedMerkleTreeInfo};
pub use generator::{ShardedSnapshot, ShardedSnapshotBuilder};
pub use resolver::{Ineligibility, ProofResolver, Resolution};

// Re-export individual helpers for convenience
pub use common::{
    hash_pair, parse_address, verify_proof, AirdropEntry, EntryHasher, MerkleTree,
    SnapshotError, SnapshotResult,
};
pub use shard::{choose_shard_nybbles, shard_id, shard_uri, MAX_SHARD_NYBBLES};
