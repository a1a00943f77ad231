// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use tokio::time::Duration;

/// Request timeout for a single blob download
pub const DEFAULT_REQ_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway used to rewrite `ipfs://` URIs
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/";

/// Largest blob accepted from a remote source
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Concurrent resolutions in a batch
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Target upper bound on entries per shard
pub const DEFAULT_MAX_SHARD_SIZE: usize = 5000;

/// Settings for the proof resolver and its HTTP transport
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub request_timeout: Duration,
    pub ipfs_gateway: String,
    pub max_body_bytes: usize,
    pub max_concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQ_TIMEOUT,
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Settings for the snapshot builder.
///
/// `shard_nybbles` pins the prefix length; when `None` it is chosen from
/// `max_shard_size`.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub shard_nybbles: Option<u8>,
    pub max_shard_size: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            shard_nybbles: None,
            max_shard_size: DEFAULT_MAX_SHARD_SIZE,
        }
    }
}

impl BuilderConfig {
    pub fn with_shard_nybbles(nybbles: u8) -> Self {
        Self {
            shard_nybbles: Some(nybbles),
            ..Self::default()
        }
    }
}
