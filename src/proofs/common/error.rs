// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use ethereum_types::H256;
use thiserror::Error;

/// Main error type for snapshot building and proof resolution
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Malformed entry handed to the builder or hasher
    #[error("Invalid entry at index {index}: {reason}")]
    InvalidEntry { index: usize, reason: String },

    /// Root requested from a tree with no leaves
    #[error("Merkle tree has no leaves")]
    EmptyTree,

    /// Proof requested for a leaf hash the tree does not contain
    #[error("Leaf {leaf:?} not found in tree")]
    LeafNotFound { leaf: H256 },

    /// Published artifact failed schema validation
    #[error("Corrupt snapshot at {uri}: {reason}")]
    CorruptSnapshot { uri: String, reason: String },

    /// Fetch failed before a definitive answer was reached
    #[error("Transport error fetching {uri}: {message}")]
    Transport {
        uri: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Writing an artifact failed
    #[error("Storage error writing {uri}: {message}")]
    Storage { uri: String, message: String },

    /// Generic errors from other sources
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SnapshotError {
    /// Create an invalid entry error
    pub fn invalid_entry(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            index,
            reason: reason.into(),
        }
    }

    /// Create a corrupt snapshot error
    pub fn corrupt(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptSnapshot {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            uri: uri.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error with source
    pub fn transport_with_source(
        uri: impl Into<String>,
        message: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Self::Transport {
            uri: uri.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a storage error
    pub fn storage(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same operation may succeed.
    ///
    /// Corrupt snapshots and invalid entries are deterministic; only I/O is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Storage { .. })
    }
}

/// Result type alias using SnapshotError
pub type SnapshotResult<T> = Result<T, SnapshotError>;
