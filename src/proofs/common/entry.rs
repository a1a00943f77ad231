// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use anyhow::Context;
use ethereum_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proofs::common::address::{parse_address, to_checksum};
use crate::proofs::common::error::{SnapshotError, SnapshotResult};
use crate::proofs::common::hasher::EntryHasher;
use crate::types::{parse_uint, RawEntry};

/// One ERC-721 allocation
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Erc721Entry {
    pub recipient: H160,
    pub token_id: U256,
}

/// One ERC-1155 allocation
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Erc1155Entry {
    pub recipient: H160,
    pub token_id: U256,
    pub amount: U256,
}

/// A single recipient allocation.
///
/// On the wire this is the flat `{recipient, tokenId[, amount]}` object; the
/// presence of `amount` selects ERC-1155.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEntry", into = "RawEntry")]
pub enum AirdropEntry {
    Erc721(Erc721Entry),
    Erc1155(Erc1155Entry),
}

impl AirdropEntry {
    pub fn erc721(recipient: H160, token_id: U256) -> Self {
        Self::Erc721(Erc721Entry {
            recipient,
            token_id,
        })
    }

    pub fn erc1155(recipient: H160, token_id: U256, amount: U256) -> Self {
        Self::Erc1155(Erc1155Entry {
            recipient,
            token_id,
            amount,
        })
    }

    /// Validate a raw entry, reporting failures against its position in the input
    pub fn from_raw(index: usize, raw: RawEntry) -> SnapshotResult<Self> {
        Self::try_from(raw).map_err(|e| SnapshotError::invalid_entry(index, format!("{:#}", e)))
    }

    pub fn recipient(&self) -> H160 {
        match self {
            Self::Erc721(e) => e.recipient,
            Self::Erc1155(e) => e.recipient,
        }
    }

    pub fn token_id(&self) -> U256 {
        match self {
            Self::Erc721(e) => e.token_id,
            Self::Erc1155(e) => e.token_id,
        }
    }

    pub fn amount(&self) -> Option<U256> {
        match self {
            Self::Erc721(_) => None,
            Self::Erc1155(e) => Some(e.amount),
        }
    }

    /// Leaf hash of this entry
    pub fn leaf(&self) -> H256 {
        EntryHasher::hash_entry(self)
    }
}

impl TryFrom<RawEntry> for AirdropEntry {
    type Error = anyhow::Error;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let recipient = parse_address(&raw.recipient).context("invalid recipient")?;
        let token_id = parse_uint(&raw.token_id, "tokenId")?;
        match raw.amount {
            Some(amount) => Ok(Self::erc1155(
                recipient,
                token_id,
                parse_uint(&amount, "amount")?,
            )),
            None => Ok(Self::erc721(recipient, token_id)),
        }
    }
}

impl From<AirdropEntry> for RawEntry {
    fn from(entry: AirdropEntry) -> Self {
        RawEntry {
            recipient: to_checksum(&entry.recipient()),
            token_id: Value::String(entry.token_id().to_string()),
            amount: entry.amount().map(|a| Value::String(a.to_string())),
        }
    }
}
