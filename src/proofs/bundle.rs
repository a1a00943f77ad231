// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use ethereum_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::proofs::common::entry::AirdropEntry;
use crate::proofs::common::error::{SnapshotError, SnapshotResult};
use crate::proofs::common::merkle::verify_proof;
use crate::proofs::shard::{check_membership, validate_shard_nybbles};

fn default_true() -> bool {
    true
}

/// Top-level snapshot descriptor, published once per root
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardedMerkleTreeInfo {
    /// Usually also the registry key; optional on read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<H256>,
    pub shard_nybbles: u8,
    pub base_uri: String,
    #[serde(default = "default_true")]
    pub is_sharded_merkle_tree: bool,
}

impl ShardedMerkleTreeInfo {
    /// Parse and validate a downloaded info blob for `expected_root`
    pub fn from_json(uri: &str, bytes: &[u8], expected_root: &H256) -> SnapshotResult<Self> {
        let info: Self = serde_json::from_slice(bytes)
            .map_err(|e| SnapshotError::corrupt(uri, format!("invalid snapshot info: {}", e)))?;

        if !info.is_sharded_merkle_tree {
            return Err(SnapshotError::corrupt(uri, "not a sharded merkle tree"));
        }
        validate_shard_nybbles(info.shard_nybbles)
            .map_err(|e| SnapshotError::corrupt(uri, e.to_string()))?;
        // A bare path would point the resolver at the local filesystem
        if let Err(e) = Url::parse(&info.base_uri) {
            return Err(SnapshotError::corrupt(
                uri,
                format!("baseUri '{}' is not a URL: {}", info.base_uri, e),
            ));
        }
        if let Some(root) = info.merkle_root {
            if root != *expected_root {
                return Err(SnapshotError::corrupt(
                    uri,
                    format!("merkleRoot {:?} does not match {:?}", root, expected_root),
                ));
            }
        }
        Ok(info)
    }
}

/// One materialized shard: its entries plus the shard-root-to-root path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFile {
    pub entries: Vec<AirdropEntry>,
    /// Sibling path from this shard's root to the global root, bottom-up
    pub proofs: Vec<H256>,
}

impl ShardFile {
    /// Parse and validate a downloaded shard file expected to hold `shard_id`
    pub fn from_json(
        uri: &str,
        bytes: &[u8],
        shard_id: &str,
        nybbles: u8,
    ) -> SnapshotResult<Self> {
        let file: Self = serde_json::from_slice(bytes)
            .map_err(|e| SnapshotError::corrupt(uri, format!("invalid shard file: {}", e)))?;

        if file.entries.is_empty() {
            return Err(SnapshotError::corrupt(uri, "shard file has no entries"));
        }
        for entry in &file.entries {
            check_membership(uri, entry, shard_id, nybbles)?;
        }
        Ok(file)
    }
}

/// Everything a claimant submits: the entry fields and the full leaf-to-root path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProof {
    pub proof: Vec<H256>,
    #[serde(flatten)]
    pub entry: AirdropEntry,
}

impl ClaimProof {
    pub fn recipient(&self) -> H160 {
        self.entry.recipient()
    }

    pub fn token_id(&self) -> U256 {
        self.entry.token_id()
    }

    pub fn amount(&self) -> Option<U256> {
        self.entry.amount()
    }

    /// Recompute the leaf and check the proof the way the claim contract does
    pub fn verify(&self, root: &H256) -> bool {
        verify_proof(root, &self.entry.leaf(), &self.proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ROOT: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

    fn root() -> H256 {
        serde_json::from_value(json!(ROOT)).unwrap()
    }

    #[test]
    fn test_info_minimal_shape() {
        let bytes = br#"{"shardNybbles": 2, "baseUri": "ipfs://cid"}"#;
        let info = ShardedMerkleTreeInfo::from_json("u", bytes, &root()).unwrap();
        assert_eq!(info.shard_nybbles, 2);
        assert_eq!(info.base_uri, "ipfs://cid");
        assert!(info.is_sharded_merkle_tree);
        assert!(info.merkle_root.is_none());
    }

    #[test]
    fn test_info_rejects_bad_blobs() {
        let cases: [&[u8]; 9] = [
            b"not json",
            br#"{"baseUri": "ipfs://cid"}"#,
            br#"{"shardNybbles": "two", "baseUri": "ipfs://cid"}"#,
            br#"{"shardNybbles": 0, "baseUri": "ipfs://cid"}"#,
            br#"{"shardNybbles": 2, "baseUri": ""}"#,
            br#"{"shardNybbles": 2, "baseUri": "/etc"}"#,
            br#"{"shardNybbles": 2, "baseUri": "../../home/user"}"#,
            br#"{"shardNybbles": 2, "baseUri": "shards/drop"}"#,
            br#"{"shardNybbles": 2, "baseUri": "ipfs://cid", "isShardedMerkleTree": false}"#,
        ];
        for bytes in cases {
            assert!(matches!(
                ShardedMerkleTreeInfo::from_json("u", bytes, &root()),
                Err(SnapshotError::CorruptSnapshot { .. })
            ));
        }
    }

    #[test]
    fn test_info_root_mismatch() {
        let blob = json!({
            "merkleRoot": format!("0x{}", "22".repeat(32)),
            "shardNybbles": 2,
            "baseUri": "ipfs://cid"
        });
        let bytes = serde_json::to_vec(&blob).unwrap();
        assert!(matches!(
            ShardedMerkleTreeInfo::from_json("u", &bytes, &root()),
            Err(SnapshotError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn test_shard_file_validation() {
        let good = json!({
            "entries": [{"recipient": "0x0a00000000000000000000000000000000000001", "tokenId": "1"}],
            "proofs": [ROOT]
        });
        let bytes = serde_json::to_vec(&good).unwrap();
        let file = ShardFile::from_json("u", &bytes, "0a", 2).unwrap();
        assert_eq!(file.entries.len(), 1);
        assert_eq!(file.proofs, vec![root()]);

        // wrong shard
        assert!(ShardFile::from_json("u", &bytes, "0b", 2).is_err());

        let bad_proof = json!({
            "entries": [{"recipient": "0x0a00000000000000000000000000000000000001", "tokenId": "1"}],
            "proofs": ["0x1234"]
        });
        let bytes = serde_json::to_vec(&bad_proof).unwrap();
        assert!(ShardFile::from_json("u", &bytes, "0a", 2).is_err());

        let fractional = json!({
            "entries": [{"recipient": "0x0a00000000000000000000000000000000000001", "tokenId": 1.5}],
            "proofs": []
        });
        let bytes = serde_json::to_vec(&fractional).unwrap();
        assert!(ShardFile::from_json("u", &bytes, "0a", 2).is_err());
    }

    #[test]
    fn test_claim_proof_is_flat() {
        let claim: ClaimProof = serde_json::from_value(json!({
            "proof": [ROOT],
            "recipient": "0x0a00000000000000000000000000000000000001",
            "tokenId": "4",
            "amount": "2"
        }))
        .unwrap();
        assert_eq!(claim.token_id(), U256::from(4));
        assert_eq!(claim.amount(), Some(U256::from(2)));

        let value = serde_json::to_value(&claim).unwrap();
        assert_eq!(value["tokenId"], json!("4"));
        assert_eq!(value["proof"], json!([ROOT]));
    }

    #[test]
    fn test_single_entry_claim_verifies_against_leaf() {
        let entry: AirdropEntry = serde_json::from_value(json!({
            "recipient": "0x0a00000000000000000000000000000000000001",
            "tokenId": "4"
        }))
        .unwrap();
        let root = entry.leaf();
        let claim = ClaimProof {
            proof: vec![],
            entry,
        };
        assert!(claim.verify(&root));
        assert!(!claim.verify(&H256::zero()));
    }
}
