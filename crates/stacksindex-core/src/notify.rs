//! Reorg notification — turns a [`ReorgDelta`] into a durable queue message.
//!
//! Publishing is strictly post-commit and fire-and-forget: the notifier
//! never blocks the ingestion path longer than the enqueue call, and a
//! publish failure is retried with backoff by the transport task, never
//! surfaced to the reconciler. Delivery is at-least-once; consumers dedupe
//! by message `id` or apply idempotently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::types::{Network, ReorgDelta};

// ─── Wire message ─────────────────────────────────────────────────────────────

/// A block reference in the wire payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    /// Identity hash (`index_block_hash`).
    pub hash: String,
    /// Block height.
    pub index: u64,
}

/// The reorg payload body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorgPayload {
    pub chain: String,
    pub network: Network,
    /// Blocks newly on the canonical chain, fork point first.
    pub apply_blocks: Vec<BlockRef>,
    /// Blocks rolled off the canonical chain, fork point first.
    pub rollback_blocks: Vec<BlockRef>,
}

/// The full wire message pushed onto the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorgMessage {
    /// `stacks-<height>-<indexBlockHash>-<unixMillis>`; the dedupe key.
    pub id: String,
    pub payload: ReorgPayload,
}

// ─── Queue transport ──────────────────────────────────────────────────────────

/// A durable, named queue with at-least-once delivery.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn push(&self, queue: &str, payload: &str) -> Result<(), ChainError>;
}

/// In-memory queue for tests and ephemeral pipelines.
#[derive(Default)]
pub struct MemoryQueue {
    messages: std::sync::Mutex<Vec<(String, String)>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything pushed so far as `(queue, payload)` pairs.
    pub fn drain(&self) -> Vec<(String, String)> {
        match self.messages.lock() {
            Ok(mut messages) => messages.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn push(&self, queue: &str, payload: &str) -> Result<(), ChainError> {
        self.messages
            .lock()
            .map_err(|_| ChainError::Queue("queue mutex poisoned".into()))?
            .push((queue.to_string(), payload.to_string()));
        Ok(())
    }
}

// ─── Notifier ─────────────────────────────────────────────────────────────────

/// Publishes reorg deltas onto a named durable queue.
pub struct ReorgNotifier {
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
    network: Network,
    max_attempts: u32,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
}

impl ReorgNotifier {
    pub fn new(queue: Arc<dyn MessageQueue>, queue_name: impl Into<String>, network: Network) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            network,
            max_attempts: 8,
            backoff_base_ms: 250,
            backoff_max_ms: 30_000,
        }
    }

    /// Override the transport retry policy.
    pub fn with_retry(mut self, max_attempts: u32, base_ms: u64, max_ms: u64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_base_ms = base_ms;
        self.backoff_max_ms = max_ms;
        self
    }

    /// Build the wire message for a delta. Exposed for tests and offline use.
    pub fn build_message(
        &self,
        delta: &ReorgDelta,
        new_tip_hash: &str,
        new_tip_height: u64,
    ) -> ReorgMessage {
        let block_ref = |b: &crate::types::BlockHeader| BlockRef {
            hash: b.index_block_hash.clone(),
            index: b.block_height,
        };
        ReorgMessage {
            id: format!(
                "stacks-{new_tip_height}-{new_tip_hash}-{}",
                chrono::Utc::now().timestamp_millis()
            ),
            payload: ReorgPayload {
                chain: "stacks".into(),
                network: self.network,
                apply_blocks: delta.marked_canonical.iter().map(block_ref).collect(),
                rollback_blocks: delta.marked_non_canonical.iter().map(block_ref).collect(),
            },
        }
    }

    /// Publish a reconciliation delta. Call only after the store commit.
    ///
    /// Empty deltas (trivial extensions) are skipped. The push happens on a
    /// spawned transport task; this method returns as soon as the message is
    /// handed off. Returns the message id, or `None` when nothing was
    /// published. Requires an ambient Tokio runtime; without one the message
    /// is dropped and an error is logged.
    pub fn notify(
        &self,
        delta: &ReorgDelta,
        new_tip_hash: &str,
        new_tip_height: u64,
    ) -> Option<String> {
        if delta.is_empty() {
            tracing::debug!(
                tip = new_tip_hash,
                height = new_tip_height,
                "empty delta; nothing to publish"
            );
            return None;
        }

        let message = self.build_message(delta, new_tip_hash, new_tip_height);
        let id = message.id.clone();
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(%error, "failed to serialize reorg message");
                return None;
            }
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(id, "no tokio runtime; reorg message dropped");
            return None;
        };

        let queue = Arc::clone(&self.queue);
        let queue_name = self.queue_name.clone();
        let policy = (self.max_attempts, self.backoff_base_ms, self.backoff_max_ms);
        let task_id = id.clone();
        handle.spawn(async move {
            publish_with_retry(&*queue, &queue_name, &task_id, &payload, policy).await;
        });
        Some(id)
    }
}

/// Push with exponential backoff. A final failure is logged, never returned:
/// the reconciliation it describes is already committed.
pub async fn publish_with_retry(
    queue: &dyn MessageQueue,
    queue_name: &str,
    id: &str,
    payload: &str,
    (max_attempts, base_ms, max_ms): (u32, u64, u64),
) {
    let mut delay = base_ms;
    for attempt in 1..=max_attempts {
        match queue.push(queue_name, payload).await {
            Ok(()) => {
                tracing::info!(id, queue = queue_name, attempt, "reorg message published");
                return;
            }
            Err(error) if attempt < max_attempts => {
                tracing::warn!(id, attempt, %error, delay_ms = delay, "publish failed; retrying");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay = (delay * 2).min(max_ms);
            }
            Err(error) => {
                tracing::error!(id, attempts = max_attempts, %error, "publish failed; giving up");
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
