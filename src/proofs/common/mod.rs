pub mod address;
pub mod entry;
pub mod error;
pub mod hasher;
pub mod merkle;

pub use address::{parse_address, to_checksum};
pub use entry::{AirdropEntry, Erc1155Entry, Erc721Entry};
pub use error::{SnapshotError, SnapshotResult};
pub use hasher::{keccak256, EntryHasher};
pub use merkle::{hash_pair, verify_proof, MerkleTree};
