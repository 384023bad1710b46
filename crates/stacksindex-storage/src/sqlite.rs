//! SQLite entity store.
//!
//! Persists blocks, microblocks, transactions, and event rows to a single
//! SQLite file. Uses `sqlx` with WAL mode for concurrent read performance.
//! [`SqliteStore::apply_update`] commits a whole reconciliation plan in one
//! transaction; a failure rolls every flag flip back.
//!
//! # Usage
//! ```rust,no_run
//! use stacksindex_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./stacksindex.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use stacksindex_core::error::ChainError;
use stacksindex_core::store::{CanonicalUpdate, ChainStore};
use stacksindex_core::types::{BlockHeader, EventKind, EventRow, MicroblockRow, TxRow};

/// SQLite-backed [`ChainStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./stacksindex.db"`) or a full
    /// SQLite URL (`"sqlite:./stacksindex.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, ChainError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| ChainError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, ChainError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| ChainError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), ChainError> {
        // WAL mode — better concurrent read throughput
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| ChainError::Storage(e.to_string()))?;

        let statements = [
            "CREATE TABLE IF NOT EXISTS blocks (
                index_block_hash        TEXT    PRIMARY KEY,
                block_hash              TEXT    NOT NULL,
                parent_index_block_hash TEXT    NOT NULL,
                parent_block_hash       TEXT    NOT NULL,
                block_height            INTEGER NOT NULL,
                burn_block_hash         TEXT    NOT NULL,
                burn_block_height       INTEGER NOT NULL,
                canonical               INTEGER NOT NULL
            );",
            "CREATE INDEX IF NOT EXISTS idx_blocks_height
                ON blocks (block_height, canonical);",
            "CREATE TABLE IF NOT EXISTS microblocks (
                microblock_hash         TEXT    PRIMARY KEY,
                microblock_sequence     INTEGER NOT NULL,
                microblock_parent_hash  TEXT    NOT NULL,
                parent_index_block_hash TEXT    NOT NULL,
                canonical               INTEGER NOT NULL,
                microblock_canonical    INTEGER NOT NULL
            );",
            "CREATE INDEX IF NOT EXISTS idx_microblocks_parent
                ON microblocks (parent_index_block_hash);",
            "CREATE TABLE IF NOT EXISTS txs (
                tx_id                TEXT    PRIMARY KEY,
                index_block_hash     TEXT    NOT NULL,
                microblock_hash      TEXT    NOT NULL,
                microblock_sequence  INTEGER NOT NULL,
                tx_index             INTEGER NOT NULL,
                canonical            INTEGER NOT NULL,
                microblock_canonical INTEGER NOT NULL
            );",
            "CREATE INDEX IF NOT EXISTS idx_txs_block ON txs (index_block_hash);",
            "CREATE INDEX IF NOT EXISTS idx_txs_microblock ON txs (microblock_hash);",
            "CREATE TABLE IF NOT EXISTS events (
                event_index      INTEGER NOT NULL,
                tx_id            TEXT    NOT NULL,
                index_block_hash TEXT    NOT NULL,
                block_height     INTEGER NOT NULL,
                canonical        INTEGER NOT NULL,
                kind             TEXT    NOT NULL,
                PRIMARY KEY (tx_id, event_index)
            );",
            "CREATE INDEX IF NOT EXISTS idx_events_block ON events (index_block_hash);",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| ChainError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

// ─── Row mapping ──────────────────────────────────────────────────────────────

fn block_from_row(row: &SqliteRow) -> BlockHeader {
    BlockHeader {
        index_block_hash: row.get("index_block_hash"),
        block_hash: row.get("block_hash"),
        parent_index_block_hash: row.get("parent_index_block_hash"),
        parent_block_hash: row.get("parent_block_hash"),
        block_height: row.get::<i64, _>("block_height") as u64,
        burn_block_hash: row.get("burn_block_hash"),
        burn_block_height: row.get::<i64, _>("burn_block_height") as u64,
        canonical: row.get::<i64, _>("canonical") != 0,
    }
}

fn microblock_from_row(row: &SqliteRow) -> MicroblockRow {
    MicroblockRow {
        microblock_hash: row.get("microblock_hash"),
        microblock_sequence: row.get::<i64, _>("microblock_sequence") as u32,
        microblock_parent_hash: row.get("microblock_parent_hash"),
        parent_index_block_hash: row.get("parent_index_block_hash"),
        canonical: row.get::<i64, _>("canonical") != 0,
        microblock_canonical: row.get::<i64, _>("microblock_canonical") != 0,
    }
}

fn tx_from_row(row: &SqliteRow) -> TxRow {
    TxRow {
        tx_id: row.get("tx_id"),
        index_block_hash: row.get("index_block_hash"),
        microblock_hash: row.get("microblock_hash"),
        microblock_sequence: row.get::<i64, _>("microblock_sequence") as u32,
        tx_index: row.get::<i64, _>("tx_index") as u32,
        canonical: row.get::<i64, _>("canonical") != 0,
        microblock_canonical: row.get::<i64, _>("microblock_canonical") != 0,
    }
}

fn event_from_row(row: &SqliteRow) -> Result<EventRow, ChainError> {
    Ok(EventRow {
        event_index: row.get::<i64, _>("event_index") as u32,
        tx_id: row.get("tx_id"),
        index_block_hash: row.get("index_block_hash"),
        block_height: row.get::<i64, _>("block_height") as u64,
        canonical: row.get::<i64, _>("canonical") != 0,
        kind: kind_from_str(row.get::<String, _>("kind").as_str())?,
    })
}

fn kind_to_str(kind: EventKind) -> &'static str {
    match kind {
        EventKind::StxAsset => "stx_asset",
        EventKind::FtAsset => "ft_asset",
        EventKind::NftAsset => "nft_asset",
        EventKind::SmartContractLog => "smart_contract_log",
        EventKind::StxLock => "stx_lock",
        EventKind::PoxSynthetic => "pox_synthetic",
    }
}

fn kind_from_str(raw: &str) -> Result<EventKind, ChainError> {
    match raw {
        "stx_asset" => Ok(EventKind::StxAsset),
        "ft_asset" => Ok(EventKind::FtAsset),
        "nft_asset" => Ok(EventKind::NftAsset),
        "smart_contract_log" => Ok(EventKind::SmartContractLog),
        "stx_lock" => Ok(EventKind::StxLock),
        "pox_synthetic" => Ok(EventKind::PoxSynthetic),
        other => Err(ChainError::Storage(format!("unknown event kind '{other}'"))),
    }
}

// ─── ChainStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl ChainStore for SqliteStore {
    async fn canonical_tip(&self) -> Result<Option<BlockHeader>, ChainError> {
        let row = sqlx::query(
            "SELECT * FROM blocks WHERE canonical = 1
             ORDER BY block_height DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

        Ok(row.as_ref().map(block_from_row))
    }

    async fn get_block(&self, index_block_hash: &str) -> Result<Option<BlockHeader>, ChainError> {
        let row = sqlx::query("SELECT * FROM blocks WHERE index_block_hash = ?")
            .bind(index_block_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ChainError::Storage(e.to_string()))?;

        Ok(row.as_ref().map(block_from_row))
    }

    async fn canonical_block_at_height(
        &self,
        height: u64,
    ) -> Result<Option<BlockHeader>, ChainError> {
        let row = sqlx::query(
            "SELECT * FROM blocks WHERE canonical = 1 AND block_height = ? LIMIT 1",
        )
        .bind(height as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

        Ok(row.as_ref().map(block_from_row))
    }

    async fn microblocks_off_parent(
        &self,
        parent_index_block_hash: &str,
    ) -> Result<Vec<MicroblockRow>, ChainError> {
        let rows = sqlx::query(
            "SELECT * FROM microblocks WHERE parent_index_block_hash = ?
             ORDER BY microblock_sequence, microblock_hash",
        )
        .bind(parent_index_block_hash)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

        Ok(rows.iter().map(microblock_from_row).collect())
    }

    async fn insert_block(&self, header: &BlockHeader) -> Result<(), ChainError> {
        // First observation wins; canonical flips go through apply_update.
        sqlx::query(
            "INSERT OR IGNORE INTO blocks
             (index_block_hash, block_hash, parent_index_block_hash,
              parent_block_hash, block_height, burn_block_hash,
              burn_block_height, canonical)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&header.index_block_hash)
        .bind(&header.block_hash)
        .bind(&header.parent_index_block_hash)
        .bind(&header.parent_block_hash)
        .bind(header.block_height as i64)
        .bind(&header.burn_block_hash)
        .bind(header.burn_block_height as i64)
        .bind(header.canonical as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn insert_microblock(&self, microblock: &MicroblockRow) -> Result<(), ChainError> {
        sqlx::query(
            "INSERT OR IGNORE INTO microblocks
             (microblock_hash, microblock_sequence, microblock_parent_hash,
              parent_index_block_hash, canonical, microblock_canonical)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&microblock.microblock_hash)
        .bind(microblock.microblock_sequence as i64)
        .bind(&microblock.microblock_parent_hash)
        .bind(&microblock.parent_index_block_hash)
        .bind(microblock.canonical as i64)
        .bind(microblock.microblock_canonical as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn insert_tx(&self, tx: &TxRow) -> Result<(), ChainError> {
        sqlx::query(
            "INSERT OR IGNORE INTO txs
             (tx_id, index_block_hash, microblock_hash, microblock_sequence,
              tx_index, canonical, microblock_canonical)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&tx.tx_id)
        .bind(&tx.index_block_hash)
        .bind(&tx.microblock_hash)
        .bind(tx.microblock_sequence as i64)
        .bind(tx.tx_index as i64)
        .bind(tx.canonical as i64)
        .bind(tx.microblock_canonical as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn insert_event(&self, event: &EventRow) -> Result<(), ChainError> {
        sqlx::query(
            "INSERT OR IGNORE INTO events
             (event_index, tx_id, index_block_hash, block_height, canonical, kind)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(event.event_index as i64)
        .bind(&event.tx_id)
        .bind(&event.index_block_hash)
        .bind(event.block_height as i64)
        .bind(event.canonical as i64)
        .bind(kind_to_str(event.kind))
        .execute(&self.pool)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn apply_update(&self, update: &CanonicalUpdate) -> Result<(), ChainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ChainError::Storage(e.to_string()))?;

        if let Some(new_block) = &update.new_block {
            sqlx::query(
                "INSERT OR REPLACE INTO blocks
                 (index_block_hash, block_hash, parent_index_block_hash,
                  parent_block_hash, block_height, burn_block_hash,
                  burn_block_height, canonical)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&new_block.index_block_hash)
            .bind(&new_block.block_hash)
            .bind(&new_block.parent_index_block_hash)
            .bind(&new_block.parent_block_hash)
            .bind(new_block.block_height as i64)
            .bind(&new_block.burn_block_hash)
            .bind(new_block.burn_block_height as i64)
            .bind(new_block.canonical as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| ChainError::Storage(e.to_string()))?;
        }

        for hash in &update.set_non_canonical {
            set_block_canonical(&mut tx, hash, false).await?;
        }
        for hash in &update.set_canonical {
            set_block_canonical(&mut tx, hash, true).await?;
        }
        for hash in &update.reject_microblocks {
            set_microblock_canonical(&mut tx, hash, false).await?;
        }
        for hash in &update.accept_microblocks {
            set_microblock_canonical(&mut tx, hash, true).await?;
        }

        tx.commit()
            .await
            .map_err(|e| ChainError::Storage(e.to_string()))?;

        debug!(
            set_canonical = update.set_canonical.len(),
            set_non_canonical = update.set_non_canonical.len(),
            accept_microblocks = update.accept_microblocks.len(),
            reject_microblocks = update.reject_microblocks.len(),
            "reconciliation plan committed"
        );
        Ok(())
    }

    async fn txs_for_block(&self, index_block_hash: &str) -> Result<Vec<TxRow>, ChainError> {
        let rows = sqlx::query(
            "SELECT * FROM txs WHERE index_block_hash = ?
             ORDER BY microblock_sequence, tx_index",
        )
        .bind(index_block_hash)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

        Ok(rows.iter().map(tx_from_row).collect())
    }

    async fn events_for_block(&self, index_block_hash: &str) -> Result<Vec<EventRow>, ChainError> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE index_block_hash = ? ORDER BY event_index",
        )
        .bind(index_block_hash)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

        rows.iter().map(event_from_row).collect()
    }
}

/// Flip a block's anchor-dimension flag and cascade to its transactions,
/// events, and the microblocks extending it.
async fn set_block_canonical(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    index_block_hash: &str,
    canonical: bool,
) -> Result<(), ChainError> {
    let flag = canonical as i64;

    sqlx::query("UPDATE blocks SET canonical = ? WHERE index_block_hash = ?")
        .bind(flag)
        .bind(index_block_hash)
        .execute(&mut **tx)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    sqlx::query("UPDATE txs SET canonical = ? WHERE index_block_hash = ?")
        .bind(flag)
        .bind(index_block_hash)
        .execute(&mut **tx)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    sqlx::query("UPDATE events SET canonical = ? WHERE index_block_hash = ?")
        .bind(flag)
        .bind(index_block_hash)
        .execute(&mut **tx)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    sqlx::query("UPDATE microblocks SET canonical = ? WHERE parent_index_block_hash = ?")
        .bind(flag)
        .bind(index_block_hash)
        .execute(&mut **tx)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    Ok(())
}

/// Flip a microblock's stream-dimension flag; its transactions mirror it.
async fn set_microblock_canonical(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    microblock_hash: &str,
    accepted: bool,
) -> Result<(), ChainError> {
    let flag = accepted as i64;

    sqlx::query("UPDATE microblocks SET microblock_canonical = ? WHERE microblock_hash = ?")
        .bind(flag)
        .bind(microblock_hash)
        .execute(&mut **tx)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    sqlx::query("UPDATE txs SET microblock_canonical = ? WHERE microblock_hash = ?")
        .bind(flag)
        .bind(microblock_hash)
        .execute(&mut **tx)
        .await
        .map_err(|e| ChainError::Storage(e.to_string()))?;

    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

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

    fn tx_row(tx_id: &str, index_block_hash: &str, microblock_hash: &str) -> TxRow {
        TxRow {
            tx_id: tx_id.into(),
            index_block_hash: index_block_hash.into(),
            microblock_hash: microblock_hash.into(),
            microblock_sequence: if microblock_hash.is_empty() {
                TxRow::ANCHORED_SEQUENCE
            } else {
                0
            },
            tx_index: 0,
            canonical: true,
            microblock_canonical: true,
        }
    }

    fn event_row(tx_id: &str, index_block_hash: &str, event_index: u32) -> EventRow {
        EventRow {
            event_index,
            tx_id: tx_id.into(),
            index_block_hash: index_block_hash.into(),
            block_height: 1,
            canonical: true,
            kind: EventKind::PoxSynthetic,
        }
    }

    // ── Blocks ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn tip_is_highest_canonical_block() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_block(&header(1, "0xa", "0x0")).await.unwrap();
        store.insert_block(&header(2, "0xb", "0xa")).await.unwrap();
        let mut orphan = header(3, "0xc", "0xb");
        orphan.canonical = false;
        store.insert_block(&orphan).await.unwrap();

        let tip = store.canonical_tip().await.unwrap().unwrap();
        assert_eq!(tip.index_block_hash, "0xb");
        assert_eq!(tip.block_height, 2);
    }

    #[tokio::test]
    async fn empty_store_has_no_tip() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.canonical_tip().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn block_roundtrip_preserves_all_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        let block = header(42, "0xdeadbeef", "0xfeedface");
        store.insert_block(&block).await.unwrap();

        let loaded = store.get_block("0xdeadbeef").await.unwrap().unwrap();
        assert_eq!(loaded, block);
    }

    #[tokio::test]
    async fn insert_is_first_observation_wins() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_block(&header(1, "0xa", "0x0")).await.unwrap();
        let mut dup = header(1, "0xa", "0x0");
        dup.canonical = false;
        store.insert_block(&dup).await.unwrap();
        assert!(store.get_block("0xa").await.unwrap().unwrap().canonical);
    }

    #[tokio::test]
    async fn canonical_block_at_height_ignores_orphans() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut orphan = header(5, "0xorphan", "0x0");
        orphan.canonical = false;
        store.insert_block(&orphan).await.unwrap();
        store.insert_block(&header(5, "0xlive", "0x0")).await.unwrap();

        let found = store.canonical_block_at_height(5).await.unwrap().unwrap();
        assert_eq!(found.index_block_hash, "0xlive");
        assert!(store.canonical_block_at_height(6).await.unwrap().is_none());
    }

    // ── apply_update cascades ─────────────────────────────────────────────────

    #[tokio::test]
    async fn cascade_flips_child_rows() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_block(&header(1, "0xa", "0x0")).await.unwrap();
        store.insert_tx(&tx_row("0xt1", "0xa", "")).await.unwrap();
        store.insert_event(&event_row("0xt1", "0xa", 0)).await.unwrap();
        store
            .insert_microblock(&MicroblockRow {
                microblock_hash: "0xmb0".into(),
                microblock_sequence: 0,
                microblock_parent_hash: "0x".into(),
                parent_index_block_hash: "0xa".into(),
                canonical: true,
                microblock_canonical: true,
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
        let microblocks = store.microblocks_off_parent("0xa").await.unwrap();
        assert!(!microblocks[0].canonical);
        // Stream-dimension flag is untouched by anchor cascades.
        assert!(microblocks[0].microblock_canonical);
    }

    #[tokio::test]
    async fn microblock_flag_mirrors_to_stream_txs_only() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_block(&header(1, "0xa", "0x0")).await.unwrap();
        store
            .insert_microblock(&MicroblockRow {
                microblock_hash: "0xmb0".into(),
                microblock_sequence: 0,
                microblock_parent_hash: "0x".into(),
                parent_index_block_hash: "0xa".into(),
                canonical: true,
                microblock_canonical: true,
            })
            .await
            .unwrap();
        store.insert_tx(&tx_row("0xstream", "0xa", "0xmb0")).await.unwrap();
        store.insert_tx(&tx_row("0xanchored", "0xa", "")).await.unwrap();

        let update = CanonicalUpdate {
            reject_microblocks: vec!["0xmb0".into()],
            ..Default::default()
        };
        store.apply_update(&update).await.unwrap();

        let txs = store.txs_for_block("0xa").await.unwrap();
        let stream = txs.iter().find(|t| t.tx_id == "0xstream").unwrap();
        let anchored = txs.iter().find(|t| t.tx_id == "0xanchored").unwrap();
        assert!(!stream.microblock_canonical);
        assert!(!stream.is_visible());
        assert!(anchored.microblock_canonical);
        assert!(anchored.is_visible());
    }

    #[tokio::test]
    async fn apply_update_commits_whole_plan() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_block(&header(1, "0xa", "0x0")).await.unwrap();
        store.insert_block(&header(2, "0xb", "0xa")).await.unwrap();
        let mut fork = header(2, "0xb2", "0xa");
        fork.canonical = false;
        store.insert_block(&fork).await.unwrap();

        // Switch height 2 from 0xb to 0xb2 and append 0xc on top.
        let new_tip = header(3, "0xc", "0xb2");
        let update = CanonicalUpdate {
            new_block: Some(new_tip),
            set_canonical: vec!["0xb2".into()],
            set_non_canonical: vec!["0xb".into()],
            ..Default::default()
        };
        store.apply_update(&update).await.unwrap();

        assert!(!store.get_block("0xb").await.unwrap().unwrap().canonical);
        assert!(store.get_block("0xb2").await.unwrap().unwrap().canonical);
        let tip = store.canonical_tip().await.unwrap().unwrap();
        assert_eq!(tip.index_block_hash, "0xc");
    }

    // ── Ordering ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn microblocks_ordered_by_sequence() {
        let store = SqliteStore::in_memory().await.unwrap();
        for (hash, seq) in [("0xmb2", 2u32), ("0xmb0", 0), ("0xmb1", 1)] {
            store
                .insert_microblock(&MicroblockRow {
                    microblock_hash: hash.into(),
                    microblock_sequence: seq,
                    microblock_parent_hash: "0x".into(),
                    parent_index_block_hash: "0xa".into(),
                    canonical: true,
                    microblock_canonical: false,
                })
                .await
                .unwrap();
        }
        let rows = store.microblocks_off_parent("0xa").await.unwrap();
        let sequences: Vec<u32> = rows.iter().map(|m| m.microblock_sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn anchored_txs_sort_after_stream_txs() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_tx(&tx_row("0xanchored", "0xa", "")).await.unwrap();
        store.insert_tx(&tx_row("0xstream", "0xa", "0xmb0")).await.unwrap();

        let txs = store.txs_for_block("0xa").await.unwrap();
        assert_eq!(txs[0].tx_id, "0xstream");
        assert_eq!(txs[1].tx_id, "0xanchored");
    }

    #[tokio::test]
    async fn events_roundtrip_with_kind() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut ev = event_row("0xt1", "0xa", 3);
        ev.kind = EventKind::SmartContractLog;
        store.insert_event(&ev).await.unwrap();
        store.insert_event(&event_row("0xt1", "0xa", 1)).await.unwrap();

        let events = store.events_for_block("0xa").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_index, 1);
        assert_eq!(events[0].kind, EventKind::PoxSynthetic);
        assert_eq!(events[1].event_index, 3);
        assert_eq!(events[1].kind, EventKind::SmartContractLog);
    }
}
