//! Canonical chain reconciliation.
//!
//! Given a new anchor-block announcement, [`Reconciler::apply_block`] decides
//! which blocks, microblocks, transactions, and events belong to the accepted
//! chain, and flips canonical flags accordingly:
//!
//! 1. **Trivial extension** — the announcement extends the current tip:
//!    insert as canonical, touch nothing else. O(1).
//! 2. **Reorg** — walk backward through `parent_index_block_hash` links to
//!    the fork point, then cascade flag flips over both branches in one
//!    store transaction.
//! 3. **Microblock dimension** — orthogonal to the above: the announcement
//!    names the confirmed prefix of its parent's microblock stream; sibling
//!    forks and discarded suffixes lose `microblock_canonical`.
//!
//! The reconciler computes a [`CanonicalUpdate`] plan and hands it to the
//! store, so the whole cascade commits atomically or not at all.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::ChainError;
use crate::store::{CanonicalUpdate, ChainStore};
use crate::types::{BlockAnnouncement, BlockHeader, ReorgDelta};

/// Reconciles incoming block announcements against the entity store.
///
/// Single-writer discipline: exactly one reconciler instance may mutate
/// canonical flags for a given store.
pub struct Reconciler {
    store: Arc<dyn ChainStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ChainStore>) -> Self {
        Self { store }
    }

    /// Apply one anchor-block announcement.
    ///
    /// Returns the [`ReorgDelta`] of blocks whose canonical flag flipped;
    /// empty on a trivial extension or when the block is already canonical.
    /// A height-contiguity violation aborts with
    /// [`ChainError::InconsistentChain`] and commits nothing.
    pub async fn apply_block(
        &self,
        announcement: &BlockAnnouncement,
    ) -> Result<ReorgDelta, ChainError> {
        let header = &announcement.header;

        // Idempotence: re-applying an already-canonical block mutates no rows.
        if let Some(existing) = self.store.get_block(&header.index_block_hash).await? {
            if existing.canonical {
                tracing::debug!(
                    index_block_hash = %header.index_block_hash,
                    height = header.block_height,
                    "block already canonical; no-op"
                );
                return Ok(ReorgDelta::default());
            }
        }

        let tip = self.store.canonical_tip().await?;
        let mut update = CanonicalUpdate::default();
        let mut delta = ReorgDelta::default();

        match tip {
            None => {
                // First block ever seen: accept as the chain root.
                update.new_block = Some(canonical_copy(header));
            }
            Some(tip) if header.parent_index_block_hash == tip.index_block_hash => {
                if header.block_height != tip.block_height + 1 {
                    return Err(ChainError::InconsistentChain {
                        index_block_hash: header.index_block_hash.clone(),
                        expected_height: tip.block_height + 1,
                        actual_height: header.block_height,
                    });
                }
                update.new_block = Some(canonical_copy(header));
            }
            Some(tip) => {
                let (new_branch, fork_point) = self.collect_new_branch(header).await?;
                let old_branch = self
                    .collect_old_branch(fork_point.block_height + 1, tip.block_height)
                    .await?;

                tracing::warn!(
                    at = header.block_height,
                    fork_height = fork_point.block_height,
                    rolled_back = old_branch.len(),
                    applied = new_branch.len() + 1,
                    "chain reorg detected"
                );

                for block in &old_branch {
                    update.set_non_canonical.push(block.index_block_hash.clone());
                    let mut copy = block.clone();
                    copy.canonical = false;
                    delta.marked_non_canonical.push(copy);
                }
                for block in &new_branch {
                    update.set_canonical.push(block.index_block_hash.clone());
                    let mut copy = block.clone();
                    copy.canonical = true;
                    delta.marked_canonical.push(copy);
                }
                update.new_block = Some(canonical_copy(header));
                delta.marked_canonical.push(canonical_copy(header));
            }
        }

        // The announced block joins the cascade: a re-announced orphan's
        // existing child rows flip back with it.
        update.set_canonical.push(header.index_block_hash.clone());

        let (accept, reject) = self.plan_microblocks(announcement).await?;
        update.accept_microblocks = accept;
        update.reject_microblocks = reject;

        self.store.apply_update(&update).await?;

        tracing::info!(
            index_block_hash = %header.index_block_hash,
            height = header.block_height,
            flipped_on = delta.marked_canonical.len(),
            flipped_off = delta.marked_non_canonical.len(),
            "block reconciled"
        );
        Ok(delta)
    }

    /// Walk backward from `header` until a canonical ancestor is found.
    ///
    /// Returns the intermediate (currently non-canonical) branch in ascending
    /// height order — excluding `header` itself — plus the fork-point block.
    /// Every step is validated for height contiguity.
    async fn collect_new_branch(
        &self,
        header: &BlockHeader,
    ) -> Result<(Vec<BlockHeader>, BlockHeader), ChainError> {
        let mut branch = Vec::new();
        let mut cursor = header.clone();
        loop {
            let parent = self
                .store
                .get_block(&cursor.parent_index_block_hash)
                .await?
                .ok_or_else(|| ChainError::UnknownParent {
                    index_block_hash: cursor.index_block_hash.clone(),
                    parent_index_block_hash: cursor.parent_index_block_hash.clone(),
                })?;
            if parent.block_height + 1 != cursor.block_height {
                return Err(ChainError::InconsistentChain {
                    index_block_hash: cursor.index_block_hash.clone(),
                    expected_height: parent.block_height + 1,
                    actual_height: cursor.block_height,
                });
            }
            if parent.canonical {
                branch.reverse();
                return Ok((branch, parent));
            }
            branch.push(parent.clone());
            cursor = parent;
        }
    }

    /// Collect the currently canonical blocks in `[from_height, to_height]`,
    /// ascending. Membership is a direct height lookup per level.
    async fn collect_old_branch(
        &self,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<BlockHeader>, ChainError> {
        let mut branch = Vec::new();
        for height in from_height..=to_height {
            if let Some(block) = self.store.canonical_block_at_height(height).await? {
                branch.push(block);
            }
        }
        Ok(branch)
    }

    /// Decide microblock acceptance for the stream off the announcement's
    /// parent block.
    ///
    /// The confirmed prefix is recovered by walking `microblock_parent_hash`
    /// links backward from the announced stream tip, cross-checked against
    /// the announced tip sequence (each step must decrement it); every other
    /// stored microblock off the same parent (sibling forks, discarded
    /// suffixes) is rejected. Only rows whose flag actually changes are
    /// planned, so a re-applied announcement stays a no-op.
    async fn plan_microblocks(
        &self,
        announcement: &BlockAnnouncement,
    ) -> Result<(Vec<String>, Vec<String>), ChainError> {
        let parent = &announcement.header.parent_index_block_hash;
        let stored = self.store.microblocks_off_parent(parent).await?;
        if stored.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let by_hash: HashMap<&str, &crate::types::MicroblockRow> = stored
            .iter()
            .map(|m| (m.microblock_hash.as_str(), m))
            .collect();

        let mut accepted: HashSet<&str> = HashSet::new();
        if let Some(tip_hash) = &announcement.parent_microblock_hash {
            let mut cursor = tip_hash.as_str();
            let mut expected_sequence = announcement.parent_microblock_sequence;
            loop {
                let Some(microblock) = by_hash.get(cursor) else {
                    tracing::warn!(
                        microblock_hash = cursor,
                        parent_index_block_hash = %parent,
                        "confirmed microblock not yet observed; accepting known prefix only"
                    );
                    break;
                };
                if microblock.microblock_sequence != expected_sequence {
                    tracing::warn!(
                        microblock_hash = cursor,
                        sequence = microblock.microblock_sequence,
                        expected_sequence,
                        "confirmed stream sequence mismatch; rejecting from here"
                    );
                    break;
                }
                accepted.insert(microblock.microblock_hash.as_str());
                if expected_sequence == 0 {
                    break;
                }
                cursor = microblock.microblock_parent_hash.as_str();
                expected_sequence -= 1;
            }
        }

        let mut accept = Vec::new();
        let mut reject = Vec::new();
        for microblock in &stored {
            let wanted = accepted.contains(microblock.microblock_hash.as_str());
            if wanted != microblock.microblock_canonical {
                if wanted {
                    accept.push(microblock.microblock_hash.clone());
                } else {
                    reject.push(microblock.microblock_hash.clone());
                }
            }
        }
        Ok((accept, reject))
    }
}

fn canonical_copy(header: &BlockHeader) -> BlockHeader {
    let mut copy = header.clone();
    copy.canonical = true;
    copy
}

// ─── Tests ────────────────────────────────────────────────────────────────────
