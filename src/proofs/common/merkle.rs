// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

//! Binary Merkle tree with sorted-pair hashing.
//!
//! Every parent is `keccak256(min(a, b) ++ max(a, b))`, so a proof is a flat list
//! of sibling hashes with no left/right flags. This is the convention of
//! OpenZeppelin's `MerkleProof.verify`.
//!
//! When a layer has an odd number of nodes, the last node is promoted to the next
//! layer unchanged (it is not paired with itself). A leaf that gets promoted has
//! no sibling at that layer, so its proof is shorter than `depth()`.

use std::collections::HashMap;

use ethereum_types::H256;
use sha3::{Digest, Keccak256};

use crate::proofs::common::error::{SnapshotError, SnapshotResult};

/// Hash two nodes in ascending byte order
pub fn hash_pair(a: &H256, b: &H256) -> H256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut h = Keccak256::new();
    h.update(lo.as_bytes());
    h.update(hi.as_bytes());
    H256::from_slice(&h.finalize())
}

/// Check a flat sibling path against a root, consuming siblings bottom-up
pub fn verify_proof(root: &H256, leaf: &H256, proof: &[H256]) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |node, sibling| hash_pair(&node, sibling));
    computed == *root
}

#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// `layers[0]` holds the leaves, the last layer holds the root
    layers: Vec<Vec<H256>>,
    /// Leaf hash to the index of its first occurrence
    positions: HashMap<H256, usize>,
}

impl MerkleTree {
    /// Build a tree over already-hashed leaves, keeping their order
    pub fn build(leaves: Vec<H256>) -> Self {
        let mut positions = HashMap::with_capacity(leaves.len());
        for (i, leaf) in leaves.iter().enumerate() {
            positions.entry(*leaf).or_insert(i);
        }

        let mut layers = vec![leaves];
        loop {
            let current = &layers[layers.len() - 1];
            if current.len() <= 1 {
                break;
            }
            let next: Vec<H256> = current
                .chunks(2)
                .map(|pair| {
                    if pair.len() == 2 {
                        hash_pair(&pair[0], &pair[1])
                    } else {
                        pair[0]
                    }
                })
                .collect();
            layers.push(next);
        }

        Self { layers, positions }
    }

    pub fn root(&self) -> SnapshotResult<H256> {
        self.layers
            .last()
            .and_then(|layer| layer.first())
            .copied()
            .ok_or(SnapshotError::EmptyTree)
    }

    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Number of hashing layers above the leaves
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    pub fn contains(&self, leaf: &H256) -> bool {
        self.positions.contains_key(leaf)
    }

    /// Sibling path from `leaf` up to (excluding) the root
    pub fn proof(&self, leaf: &H256) -> SnapshotResult<Vec<H256>> {
        let index = *self
            .positions
            .get(leaf)
            .ok_or(SnapshotError::LeafNotFound { leaf: *leaf })?;
        Ok(self.proof_at(index))
    }

    fn proof_at(&self, mut index: usize) -> Vec<H256> {
        let mut proof = Vec::with_capacity(self.depth());
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = index ^ 1;
            if sibling < layer.len() {
                proof.push(layer[sibling]);
            }
            index /= 2;
        }
        proof
    }
}
