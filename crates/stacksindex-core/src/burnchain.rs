//! Burn-chain acceptance tracking.
//!
//! The burn chain is reconciled by monotonicity rather than a stored-flag
//! cascade: the tracker keeps one accepted tip `(hash, height)` and orphans
//! any announcement that does not extend it. Orphans are recorded and never
//! revisited.

use crate::types::BurnBlockRow;

/// Outcome of feeding one burn-block announcement to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnAccept {
    /// The announcement extended the burn tip.
    Accepted,
    /// The announcement was orphaned (stale height or conflicting hash).
    Orphaned,
}

/// Tracks the accepted burn-chain tip.
pub struct BurnchainTracker {
    tip: Option<BurnBlockRow>,
    orphans: Vec<BurnBlockRow>,
}

impl BurnchainTracker {
    pub fn new() -> Self {
        Self {
            tip: None,
            orphans: Vec::new(),
        }
    }

    /// Resume from a previously accepted tip.
    pub fn with_tip(tip: BurnBlockRow) -> Self {
        Self {
            tip: Some(tip),
            orphans: Vec::new(),
        }
    }

    /// The currently accepted burn tip.
    pub fn tip(&self) -> Option<&BurnBlockRow> {
        self.tip.as_ref()
    }

    /// Burn blocks orphaned so far, in arrival order.
    pub fn orphans(&self) -> &[BurnBlockRow] {
        &self.orphans
    }

    /// Feed one burn-block announcement.
    ///
    /// Accepted iff the height strictly increases the tip; a repeat of the
    /// tip's own `(hash, height)` is a no-op `Accepted`. Anything else —
    /// stale height, or a conflicting hash at the tip height — is orphaned.
    pub fn accept(&mut self, burn_block: BurnBlockRow) -> BurnAccept {
        match &self.tip {
            None => {
                self.tip = Some(burn_block);
                BurnAccept::Accepted
            }
            Some(tip) if burn_block.burn_block_height > tip.burn_block_height => {
                self.tip = Some(burn_block);
                BurnAccept::Accepted
            }
            Some(tip)
                if burn_block.burn_block_height == tip.burn_block_height
                    && burn_block.burn_block_hash == tip.burn_block_hash =>
            {
                BurnAccept::Accepted
            }
            Some(tip) => {
                tracing::warn!(
                    hash = %burn_block.burn_block_hash,
                    height = burn_block.burn_block_height,
                    tip_height = tip.burn_block_height,
                    "burn block orphaned"
                );
                self.orphans.push(burn_block);
                BurnAccept::Orphaned
            }
        }
    }
}

impl Default for BurnchainTracker {
    fn default() -> Self {
        Self::new()
    }
}
