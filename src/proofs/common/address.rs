// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Result};
use ethereum_types::H160;

use crate::proofs::common::hasher::keccak256;

/// Parse an Ethereum address from a hex string (with or without `0x`).
///
/// All-lowercase and all-uppercase input is accepted as-is. Mixed-case input is
/// treated as EIP-55 and must carry a valid checksum. The zero address is rejected.
pub fn parse_address(addr: &str) -> Result<H160> {
    let trimmed = addr.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() != 40 {
        return Err(anyhow!(
            "Invalid address length: expected 40 hex chars, got {}",
            hex_part.len()
        ));
    }

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(hex_part, &mut bytes)
        .map_err(|e| anyhow!("Invalid hex in address '{}': {}", trimmed, e))?;
    let address = H160::from(bytes);

    if address.is_zero() {
        return Err(anyhow!("Zero address not allowed"));
    }

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum(&address)[2..] != *hex_part {
        return Err(anyhow!("Invalid EIP-55 checksum for address '{}'", trimmed));
    }

    Ok(address)
}

/// EIP-55 mixed-case checksum encoding
pub fn to_checksum(address: &H160) -> String {
    let lower = hex::encode(address.as_bytes());
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
