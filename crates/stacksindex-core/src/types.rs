//! Shared row and wire types for the reconciliation pipeline.
//!
//! Identity convention: a Stacks block is identified by its
//! `index_block_hash` (the hash over block + burn linkage), never by its
//! plain `block_hash` — two competing forks can carry the same `block_hash`
//! at different burn attachments.

use serde::{Deserialize, Serialize};

// ─── Network ──────────────────────────────────────────────────────────────────

/// Which Stacks network the indexed node follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

// ─── BlockHeader ──────────────────────────────────────────────────────────────

/// Header row for an anchor block, including its burn-chain attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Unique block identity (`0x…`).
    pub index_block_hash: String,
    /// Plain block hash (`0x…`); not unique across forks.
    pub block_hash: String,
    /// Parent identity hash.
    pub parent_index_block_hash: String,
    /// Parent plain hash.
    pub parent_block_hash: String,
    /// Stacks block height.
    pub block_height: u64,
    /// Burn block this anchor block is attached to.
    pub burn_block_hash: String,
    /// Height of that burn block.
    pub burn_block_height: u64,
    /// Whether this block is on the accepted chain.
    pub canonical: bool,
}

impl BlockHeader {
    /// Returns `true` if `parent` is the direct parent of `self`
    /// (identity linkage and height step of exactly one).
    pub fn extends(&self, parent: &BlockHeader) -> bool {
        self.block_height == parent.block_height + 1
            && self.parent_index_block_hash == parent.index_block_hash
    }
}

// ─── MicroblockRow ────────────────────────────────────────────────────────────

/// A microblock in the stream extending an anchor block.
///
/// `microblock_canonical` is independent of the owning anchor block's
/// `canonical`: a stream can be superseded by a competing stream confirmed
/// by a later anchor block while the anchor lineage itself stays canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroblockRow {
    pub microblock_hash: String,
    pub microblock_sequence: u32,
    pub microblock_parent_hash: String,
    /// Identity of the anchor block this stream extends.
    pub parent_index_block_hash: String,
    /// Anchor-chain flag, mirrors the parent anchor block.
    pub canonical: bool,
    /// Stream-dimension flag.
    pub microblock_canonical: bool,
}

// ─── TxRow ────────────────────────────────────────────────────────────────────

/// A transaction row. Anchored transactions carry an empty microblock hash
/// and sequence [`TxRow::ANCHORED_SEQUENCE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRow {
    pub tx_id: String,
    pub index_block_hash: String,
    pub microblock_hash: String,
    pub microblock_sequence: u32,
    pub tx_index: u32,
    pub canonical: bool,
    pub microblock_canonical: bool,
}

impl TxRow {
    /// Sentinel sequence for transactions mined directly in an anchor block.
    pub const ANCHORED_SEQUENCE: u32 = u32::MAX;

    /// Effective visibility: both the anchor-chain and the stream dimension
    /// must accept the transaction.
    pub fn is_visible(&self) -> bool {
        self.canonical && self.microblock_canonical
    }

    /// Returns `true` if this transaction was mined in a microblock.
    pub fn is_microblock_tx(&self) -> bool {
        self.microblock_sequence != Self::ANCHORED_SEQUENCE
    }
}

// ─── EventRow ─────────────────────────────────────────────────────────────────

/// Kind tag for an event row. One variant per event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StxAsset,
    FtAsset,
    NftAsset,
    SmartContractLog,
    StxLock,
    /// Synthetic stacking event reconstructed from a PoX print log.
    PoxSynthetic,
}

/// Base event row. The `canonical` flag always mirrors the owning
/// transaction's at commit time and is never set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub event_index: u32,
    pub tx_id: String,
    /// Owning block identity, denormalized so canonical cascades are direct
    /// key lookups rather than graph walks.
    pub index_block_hash: String,
    pub block_height: u64,
    pub canonical: bool,
    pub kind: EventKind,
}

// ─── BurnBlockRow ─────────────────────────────────────────────────────────────

/// A burn-chain block. Many Stacks blocks may reference one burn block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnBlockRow {
    pub burn_block_hash: String,
    pub burn_block_height: u64,
}

// ─── BlockAnnouncement ────────────────────────────────────────────────────────

/// A new-block announcement from the node, as fed to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAnnouncement {
    pub header: BlockHeader,
    /// Tip of the microblock stream (off this block's parent) that this
    /// anchor block confirms. `None` confirms an empty stream.
    pub parent_microblock_hash: Option<String>,
    /// Sequence of that confirmed tip; ignored when the hash is `None`.
    pub parent_microblock_sequence: u32,
}

impl BlockAnnouncement {
    /// Announcement confirming no microblocks.
    pub fn anchored(header: BlockHeader) -> Self {
        Self {
            header,
            parent_microblock_hash: None,
            parent_microblock_sequence: 0,
        }
    }
}

// ─── ReorgDelta ───────────────────────────────────────────────────────────────

/// The set of canonical-flag flips produced by one reconciliation.
///
/// Both lists are empty on a trivial tip extension. This value is the sole
/// input to the reorg notifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorgDelta {
    /// Blocks newly marked canonical, fork point first.
    pub marked_canonical: Vec<BlockHeader>,
    /// Blocks newly marked non-canonical, fork point first.
    pub marked_non_canonical: Vec<BlockHeader>,
}

impl ReorgDelta {
    /// Returns `true` if no flags were flipped.
    pub fn is_empty(&self) -> bool {
        self.marked_canonical.is_empty() && self.marked_non_canonical.is_empty()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn header(height: u64, index_hash: &str, parent_index_hash: &str) -> BlockHeader {
        BlockHeader {
            index_block_hash: index_hash.into(),
            block_hash: format!("0xb{height}"),
            parent_index_block_hash: parent_index_hash.into(),
            parent_block_hash: format!("0xb{}", height.saturating_sub(1)),
            block_height: height,
            burn_block_hash: format!("0xburn{height}"),
            burn_block_height: 700_000 + height,
            canonical: true,
        }
    }

    #[test]
    fn block_extends_parent() {
        let parent = header(100, "0xaaa", "0x000");
        let child = header(101, "0xbbb", "0xaaa");
        assert!(child.extends(&parent));
        assert!(!parent.extends(&child));
    }

    #[test]
    fn block_extends_false_on_height_gap() {
        let parent = header(100, "0xaaa", "0x000");
        let mut child = header(102, "0xccc", "0xaaa");
        child.block_height = 102;
        assert!(!child.extends(&parent));
    }

    #[test]
    fn tx_visibility_is_conjunction() {
        let mut tx = TxRow {
            tx_id: "0xt1".into(),
            index_block_hash: "0xaaa".into(),
            microblock_hash: "0xmb0".into(),
            microblock_sequence: 0,
            tx_index: 0,
            canonical: true,
            microblock_canonical: true,
        };
        assert!(tx.is_visible());
        tx.microblock_canonical = false;
        assert!(!tx.is_visible());
        tx.microblock_canonical = true;
        tx.canonical = false;
        assert!(!tx.is_visible());
    }

    #[test]
    fn anchored_tx_sequence_sentinel() {
        let tx = TxRow {
            tx_id: "0xt1".into(),
            index_block_hash: "0xaaa".into(),
            microblock_hash: String::new(),
            microblock_sequence: TxRow::ANCHORED_SEQUENCE,
            tx_index: 0,
            canonical: true,
            microblock_canonical: true,
        };
        assert!(!tx.is_microblock_tx());
    }

    #[test]
    fn delta_empty_on_default() {
        let delta = ReorgDelta::default();
        assert!(delta.is_empty());
    }

    #[test]
    fn network_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Network::Mainnet).unwrap(), "\"mainnet\"");
        assert_eq!(Network::Testnet.to_string(), "testnet");
    }
}
