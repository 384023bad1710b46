//! stacksindex-core — canonical chain reconciliation for a Stacks event
//! stream.
//!
//! # Architecture
//!
//! ```text
//! node announcement → Reconciler ── CanonicalUpdate ──→ ChainStore (one tx)
//!                         │                                  │
//!                         └── ReorgDelta ──→ ReorgNotifier ──→ durable queue
//!
//! BurnchainTracker  (burn-chain monotone acceptance)
//! replay            (offline reverse-scan reconstruction / oracle)
//! ```

pub mod burnchain;
pub mod config;
pub mod error;
pub mod notify;
pub mod reconcile;
pub mod replay;
pub mod store;
pub mod types;

pub use burnchain::{BurnAccept, BurnchainTracker};
pub use config::{IngestConfig, IngestConfigBuilder};
pub use error::ChainError;
pub use notify::{MemoryQueue, MessageQueue, ReorgMessage, ReorgNotifier};
pub use reconcile::Reconciler;
pub use replay::{scan_burn_log, scan_stacks_log, ReplaySummary};
pub use store::{CanonicalUpdate, ChainStore, MemoryChainStore};
pub use types::{
    BlockAnnouncement, BlockHeader, BurnBlockRow, EventKind, EventRow, MicroblockRow, Network,
    ReorgDelta, TxRow,
};
