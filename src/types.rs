// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Result};
use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 32-byte commitment hash (leaves, nodes, roots)
pub type Hash32 = H256;

/// Untyped entry as it appears in builder input and shard files.
///
/// `tokenId` and `amount` may be JSON integers, decimal strings or `0x` hex strings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    pub recipient: String,
    pub token_id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,
}

/// Parse a uint256 from a JSON value, rejecting anything that is not an exact integer
pub fn parse_uint(value: &Value, field: &str) -> Result<U256> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok(U256::from(v))
            } else if n.is_i64() {
                Err(anyhow!("{} must not be negative, got {}", field, n))
            } else {
                Err(anyhow!("{} must be an integer, got {}", field, n))
            }
        }
        Value::String(s) => parse_uint_str(s, field),
        other => Err(anyhow!(
            "{} must be an integer or numeric string, got {}",
            field,
            other
        )),
    }
}

/// Parse a uint256 from a decimal or `0x` hex string
pub fn parse_uint_str(s: &str, field: &str) -> Result<U256> {
    let s = s.trim();
    if let Some(hex_part) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex_part.is_empty() || hex_part.len() > 64 {
            return Err(anyhow!("{} hex value '{}' has invalid length", field, s));
        }
        return U256::from_str_radix(hex_part, 16)
            .map_err(|e| anyhow!("{} is not valid hex '{}': {:?}", field, s, e));
    }

    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(anyhow!("{} must be an integer, got '{}'", field, s));
    }
    U256::from_dec_str(s).map_err(|e| anyhow!("{} out of range '{}': {:?}", field, s, e))
}

/// Parse a 32-byte hash from `0x`-prefixed or bare hex
pub fn parse_hash32(s: &str) -> Result<Hash32> {
    let s = s.trim();
    let hex_part = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if hex_part.len() != 64 {
        return Err(anyhow!(
            "Invalid hash length: expected 64 hex chars, got {}",
            hex_part.len()
        ));
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hex_part, &mut bytes)
        .map_err(|e| anyhow!("Invalid hex in hash '{}': {}", s, e))?;
    Ok(Hash32::from(bytes))
}
