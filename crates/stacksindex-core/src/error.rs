//! Error types for the reconciliation pipeline.

use thiserror::Error;

/// Errors that can occur while reconciling the canonical chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown parent block {parent_index_block_hash} while attaching {index_block_hash}")]
    UnknownParent {
        index_block_hash: String,
        parent_index_block_hash: String,
    },

    #[error(
        "Inconsistent chain at {index_block_hash}: expected height {expected_height}, got {actual_height}"
    )]
    InconsistentChain {
        index_block_hash: String,
        expected_height: u64,
        actual_height: u64,
    },

    #[error("Canonical tip missing while reconciling {index_block_hash}")]
    MissingTip { index_block_hash: String },

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ChainError {
    /// Returns `true` if the error is a fatal consistency violation that
    /// must abort the whole reconciliation with no partial commit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InconsistentChain { .. } | Self::MissingTip { .. }
        )
    }
}
