// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use ethereum_types::H160;

use crate::proofs::common::entry::AirdropEntry;
use crate::proofs::common::error::{SnapshotError, SnapshotResult};

/// Largest supported shard prefix length (16^5 buckets)
pub const MAX_SHARD_NYBBLES: u8 = 5;

/// Shard id of an address: the first `nybbles` lowercase hex digits after `0x`
pub fn shard_id(address: &H160, nybbles: u8) -> String {
    hex::encode(address.as_bytes())
        .chars()
        .take(nybbles as usize)
        .collect()
}

/// Location of a shard file, tolerating a trailing slash on `base_uri`
pub fn shard_uri(base_uri: &str, shard_id: &str) -> String {
    format!("{}/{}.json", base_uri.trim_end_matches('/'), shard_id)
}

pub fn validate_shard_nybbles(nybbles: u8) -> SnapshotResult<u8> {
    if (1..=MAX_SHARD_NYBBLES).contains(&nybbles) {
        Ok(nybbles)
    } else {
        Err(anyhow::anyhow!(
            "shardNybbles must be between 1 and {}, got {}",
            MAX_SHARD_NYBBLES,
            nybbles
        )
        .into())
    }
}

/// Size of the largest shard when partitioning by `nybbles`
pub fn largest_shard(entries: &[AirdropEntry], nybbles: u8) -> usize {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(shard_id(&entry.recipient(), nybbles)).or_default() += 1;
    }
    counts.into_values().max().unwrap_or(0)
}

/// Smallest prefix length whose largest shard holds at most `max_shard_size` entries.
///
/// Falls back to [`MAX_SHARD_NYBBLES`] when no prefix length is fine-grained enough,
/// which happens when many entries share one recipient.
pub fn choose_shard_nybbles(entries: &[AirdropEntry], max_shard_size: usize) -> u8 {
    for nybbles in 1..=MAX_SHARD_NYBBLES {
        let largest = largest_shard(entries, nybbles);
        if largest <= max_shard_size {
            tracing::debug!(nybbles, largest, "selected shard prefix length");
            return nybbles;
        }
    }
    tracing::warn!(
        max_shard_size,
        "no shard prefix length keeps shards under target; using {}",
        MAX_SHARD_NYBBLES
    );
    MAX_SHARD_NYBBLES
}

/// Check that an entry belongs in the named shard
pub fn check_membership(
    uri: &str,
    entry: &AirdropEntry,
    expected: &str,
    nybbles: u8,
) -> SnapshotResult<()> {
    let actual = shard_id(&entry.recipient(), nybbles);
    if actual != expected {
        return Err(SnapshotError::corrupt(
            uri,
            format!(
                "entry for {:?} belongs to shard {} not {}",
                entry.recipient(),
                actual,
                expected
            ),
        ));
    }
    Ok(())
}
