// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use ethereum_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

use crate::proofs::common::entry::{AirdropEntry, Erc1155Entry, Erc721Entry};

/// General Keccak256 hash function
pub fn keccak256(bytes: impl AsRef<[u8]>) -> [u8; 32] {
    let mut h = Keccak256::new();
    h.update(bytes.as_ref());
    let out = h.finalize();
    let mut r = [0u8; 32];
    r.copy_from_slice(&out);
    r
}

/// Left-pad an address into a 32-byte ABI word
pub fn address_word(address: &H160) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Big-endian 32-byte ABI word of a uint256
pub fn uint_word(value: &U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

/// Leaf hashing for airdrop entries.
///
/// Leaves are `keccak256(abi.encode(...))` over the entry's fields, which is what
/// the claim contracts recompute from calldata. The two entry shapes encode to
/// different lengths (64 vs 96 bytes), so an ERC-721 leaf can never collide with
/// an ERC-1155 leaf for the same recipient and token.
pub struct EntryHasher;

impl EntryHasher {
    /// `keccak256(abi.encode(address recipient, uint256 tokenId))`
    pub fn hash_erc721(entry: &Erc721Entry) -> H256 {
        let mut h = Keccak256::new();
        h.update(address_word(&entry.recipient));
        h.update(uint_word(&entry.token_id));
        H256::from_slice(&h.finalize())
    }

    /// `keccak256(abi.encode(address recipient, uint256 tokenId, uint256 amount))`
    pub fn hash_erc1155(entry: &Erc1155Entry) -> H256 {
        let mut h = Keccak256::new();
        h.update(address_word(&entry.recipient));
        h.update(uint_word(&entry.token_id));
        h.update(uint_word(&entry.amount));
        H256::from_slice(&h.finalize())
    }

    /// Hash any entry, dispatching on its token standard
    pub fn hash_entry(entry: &AirdropEntry) -> H256 {
        match entry {
            AirdropEntry::Erc721(e) => Self::hash_erc721(e),
            AirdropEntry::Erc1155(e) => Self::hash_erc1155(e),
        }
    }
}
