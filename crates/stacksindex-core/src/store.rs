//! The entity-store boundary consumed by the reconciler.
//!
//! The reconciler computes a [`CanonicalUpdate`] plan (pure), and the store
//! commits it inside **one** transaction via [`ChainStore::apply_update`].
//! Concurrent readers therefore observe only pre- or post-reconciliation
//! state, never a mix; a failed commit rolls the whole plan back and the
//! caller retries the same announcement.

use async_trait::async_trait;

use crate::error::ChainError;
use crate::types::{BlockHeader, EventRow, MicroblockRow, TxRow};

/// One reconciliation's worth of canonical-flag flips, committed atomically.
///
/// Rows are only ever flagged, never deleted: orphaned history persists with
/// `canonical = false` for audit and replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalUpdate {
    /// The announced block, upserted with `canonical = true`.
    pub new_block: Option<BlockHeader>,
    /// Blocks to mark canonical; cascades to every transaction and event
    /// row carrying the block's `index_block_hash`, and to microblocks
    /// whose stream extends the block.
    pub set_canonical: Vec<String>,
    /// Blocks to mark non-canonical; cascades identically.
    pub set_non_canonical: Vec<String>,
    /// Microblock hashes gaining `microblock_canonical = true`; their
    /// transactions (and those transactions' events) mirror the flag.
    pub accept_microblocks: Vec<String>,
    /// Microblock hashes losing `microblock_canonical`.
    pub reject_microblocks: Vec<String>,
}

impl CanonicalUpdate {
    /// Returns `true` if committing this plan would mutate nothing.
    pub fn is_noop(&self) -> bool {
        self.new_block.is_none()
            && self.set_canonical.is_empty()
            && self.set_non_canonical.is_empty()
            && self.accept_microblocks.is_empty()
            && self.reject_microblocks.is_empty()
    }
}

/// Narrow contract over the relational entity store.
///
/// Implementations must be `Send + Sync` so the store can be shared as
/// `Arc<dyn ChainStore>` across Tokio tasks. The canonical tip is derived,
/// not stored: the canonical block with the greatest height.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// The current canonical tip, if any block has been accepted.
    async fn canonical_tip(&self) -> Result<Option<BlockHeader>, ChainError>;

    /// Look up a block by identity hash.
    async fn get_block(&self, index_block_hash: &str) -> Result<Option<BlockHeader>, ChainError>;

    /// The canonical block at a given height, if any.
    async fn canonical_block_at_height(
        &self,
        height: u64,
    ) -> Result<Option<BlockHeader>, ChainError>;

    /// All microblocks extending the given anchor block, any stream.
    async fn microblocks_off_parent(
        &self,
        parent_index_block_hash: &str,
    ) -> Result<Vec<MicroblockRow>, ChainError>;

    /// Record a block on first observation (flags as given).
    async fn insert_block(&self, header: &BlockHeader) -> Result<(), ChainError>;

    /// Record a microblock on first observation.
    async fn insert_microblock(&self, microblock: &MicroblockRow) -> Result<(), ChainError>;

    /// Record a transaction on first observation.
    async fn insert_tx(&self, tx: &TxRow) -> Result<(), ChainError>;

    /// Record an event on first observation.
    async fn insert_event(&self, event: &EventRow) -> Result<(), ChainError>;

    /// Commit a reconciliation plan in one transaction.
    async fn apply_update(&self, update: &CanonicalUpdate) -> Result<(), ChainError>;

    /// Transactions owned by a block, ordered by microblock sequence then
    /// transaction index.
    async fn txs_for_block(&self, index_block_hash: &str) -> Result<Vec<TxRow>, ChainError>;

    /// Events owned by a block, ordered by event index.
    async fn events_for_block(&self, index_block_hash: &str) -> Result<Vec<EventRow>, ChainError>;
}

// ─── In-memory store (tests / ephemeral ingestion) ───────────────────────────

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct MemoryInner {
    blocks: HashMap<String, BlockHeader>,
    microblocks: HashMap<String, MicroblockRow>,
    txs: HashMap<String, TxRow>,
    events: Vec<EventRow>,
}

/// In-memory `ChainStore`. All data is lost when the value is dropped.
///
/// The single mutex makes `apply_update` trivially atomic with respect to
/// concurrent readers, matching the one-transaction discipline of the
/// persistent backends.
#[derive(Default)]
pub struct MemoryChainStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, ChainError> {
        self.inner
            .lock()
            .map_err(|_| ChainError::Storage("store mutex poisoned".into()))
    }
}

impl MemoryInner {
    fn set_block_canonical(&mut self, index_block_hash: &str, canonical: bool) {
        if let Some(block) = self.blocks.get_mut(index_block_hash) {
            block.canonical = canonical;
        }
        for tx in self.txs.values_mut() {
            if tx.index_block_hash == index_block_hash {
                tx.canonical = canonical;
            }
        }
        for event in self.events.iter_mut() {
            if event.index_block_hash == index_block_hash {
                event.canonical = canonical;
            }
        }
        // Streams extending the block mirror its anchor-dimension flag.
        for microblock in self.microblocks.values_mut() {
            if microblock.parent_index_block_hash == index_block_hash {
                microblock.canonical = canonical;
            }
        }
    }

    fn set_microblock_canonical(&mut self, microblock_hash: &str, accepted: bool) {
        if let Some(microblock) = self.microblocks.get_mut(microblock_hash) {
            microblock.microblock_canonical = accepted;
        }
        for tx in self.txs.values_mut() {
            if tx.microblock_hash == microblock_hash {
                tx.microblock_canonical = accepted;
            }
        }
    }
}

#[async_trait]
impl ChainStore for MemoryChainStore {
    async fn canonical_tip(&self) -> Result<Option<BlockHeader>, ChainError> {
        let inner = self.lock()?;
        Ok(inner
            .blocks
            .values()
            .filter(|b| b.canonical)
            .max_by_key(|b| b.block_height)
            .cloned())
    }

    async fn get_block(&self, index_block_hash: &str) -> Result<Option<BlockHeader>, ChainError> {
        Ok(self.lock()?.blocks.get(index_block_hash).cloned())
    }

    async fn canonical_block_at_height(
        &self,
        height: u64,
    ) -> Result<Option<BlockHeader>, ChainError> {
        let inner = self.lock()?;
        Ok(inner
            .blocks
            .values()
            .find(|b| b.canonical && b.block_height == height)
            .cloned())
    }

    async fn microblocks_off_parent(
        &self,
        parent_index_block_hash: &str,
    ) -> Result<Vec<MicroblockRow>, ChainError> {
        let inner = self.lock()?;
        let mut rows: Vec<_> = inner
            .microblocks
            .values()
            .filter(|m| m.parent_index_block_hash == parent_index_block_hash)
            .cloned()
            .collect();
        rows.sort_by_key(|m| (m.microblock_sequence, m.microblock_hash.clone()));
        Ok(rows)
    }

    async fn insert_block(&self, header: &BlockHeader) -> Result<(), ChainError> {
        self.lock()?
            .blocks
            .entry(header.index_block_hash.clone())
            .or_insert_with(|| header.clone());
        Ok(())
    }

    async fn insert_microblock(&self, microblock: &MicroblockRow) -> Result<(), ChainError> {
        self.lock()?
            .microblocks
            .entry(microblock.microblock_hash.clone())
            .or_insert_with(|| microblock.clone());
        Ok(())
    }

    async fn insert_tx(&self, tx: &TxRow) -> Result<(), ChainError> {
        self.lock()?
            .txs
            .entry(tx.tx_id.clone())
            .or_insert_with(|| tx.clone());
        Ok(())
    }

    async fn insert_event(&self, event: &EventRow) -> Result<(), ChainError> {
        self.lock()?.events.push(event.clone());
        Ok(())
    }

    async fn apply_update(&self, update: &CanonicalUpdate) -> Result<(), ChainError> {
        let mut inner = self.lock()?;
        if let Some(new_block) = &update.new_block {
            inner
                .blocks
                .insert(new_block.index_block_hash.clone(), new_block.clone());
        }
        for hash in &update.set_non_canonical {
            inner.set_block_canonical(hash, false);
        }
        for hash in &update.set_canonical {
            inner.set_block_canonical(hash, true);
        }
        for hash in &update.reject_microblocks {
            inner.set_microblock_canonical(hash, false);
        }
        for hash in &update.accept_microblocks {
            inner.set_microblock_canonical(hash, true);
        }
        Ok(())
    }

    async fn txs_for_block(&self, index_block_hash: &str) -> Result<Vec<TxRow>, ChainError> {
        let inner = self.lock()?;
        let mut rows: Vec<_> = inner
            .txs
            .values()
            .filter(|t| t.index_block_hash == index_block_hash)
            .cloned()
            .collect();
        rows.sort_by_key(|t| (t.microblock_sequence, t.tx_index));
        Ok(rows)
    }

    async fn events_for_block(&self, index_block_hash: &str) -> Result<Vec<EventRow>, ChainError> {
        let inner = self.lock()?;
        let mut rows: Vec<_> = inner
            .events
            .iter()
            .filter(|e| e.index_block_hash == index_block_hash)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.event_index);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(height: u64, index_hash: &str, parent_index_hash: &str) -> BlockHeader {
        BlockHeader {
            index_block_hash: index_hash.into(),
            block_hash: format!("0xb{height}"),
            parent_index_block_hash: parent_index_hash.into(),
            parent_block_hash: String::new(),
            block_height: height,
            burn_block_hash: format!("0xburn{height}"),
            burn_block_height: 700_000 + height,
            canonical: true,
        }
    }

    #[tokio::test]
    async fn tip_is_highest_canonical_block() {
        let store = MemoryChainStore::new();
        store.insert_block(&header(1, "0xa", "0x0")).await.unwrap();
        store.insert_block(&header(2, "0xb", "0xa")).await.unwrap();
        let mut orphan = header(3, "0xc", "0xb");
        orphan.canonical = false;
        store.insert_block(&orphan).await.unwrap();

        let tip = store.canonical_tip().await.unwrap().unwrap();
        assert_eq!(tip.index_block_hash, "0xb");
    }

    #[tokio::test]
    async fn cascade_flips_child_rows() {
        let store = MemoryChainStore::new();
        store.insert_block(&header(1, "0xa", "0x0")).await.unwrap();
        store
            .insert_tx(&TxRow {
                tx_id: "0xt1".into(),
                index_block_hash: "0xa".into(),
                microblock_hash: String::new(),
                microblock_sequence: TxRow::ANCHORED_SEQUENCE,
                tx_index: 0,
                canonical: true,
                microblock_canonical: true,
            })
            .await
            .unwrap();
        store
            .insert_event(&EventRow {
                event_index: 0,
                tx_id: "0xt1".into(),
                index_block_hash: "0xa".into(),
                block_height: 1,
                canonical: true,
                kind: crate::types::EventKind::StxAsset,
            })
            .await
            .unwrap();

        let update = CanonicalUpdate {
            set_non_canonical: vec!["0xa".into()],
            ..Default::default()
        };
        store.apply_update(&update).await.unwrap();

        assert!(!store.get_block("0xa").await.unwrap().unwrap().canonical);
        assert!(!store.txs_for_block("0xa").await.unwrap()[0].canonical);
        assert!(!store.events_for_block("0xa").await.unwrap()[0].canonical);
    }

    #[tokio::test]
    async fn insert_is_first_observation_wins() {
        let store = MemoryChainStore::new();
        store.insert_block(&header(1, "0xa", "0x0")).await.unwrap();
        let mut dup = header(1, "0xa", "0x0");
        dup.canonical = false;
        store.insert_block(&dup).await.unwrap();
        assert!(store.get_block("0xa").await.unwrap().unwrap().canonical);
    }
}
