//! Persistent entity store for StacksIndex.
//!
//! Implements [`stacksindex_core::store::ChainStore`] on SQLite via `sqlx`.
//! Canonical-flag cascades run inside a single transaction, so readers see
//! either the pre- or post-reconciliation chain, never a mix.

pub mod sqlite;

pub use sqlite::SqliteStore;
