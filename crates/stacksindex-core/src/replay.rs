//! Offline canonical-chain reconstruction from a complete historical log.
//!
//! Scanning the log **backward** from the last-seen block, a block is
//! canonical iff it is the currently expected head of the still-growing
//! chain and sits exactly one height below the previously accepted block;
//! everything else is orphaned. Burn blocks use the same reverse scan with
//! strictly-decreasing heights.
//!
//! This is a reference tool for corpus pre-processing and for validating the
//! live [`Reconciler`](crate::reconcile::Reconciler): it shares the live
//! algorithm's observable properties (single canonical block per height,
//! orphan counts) without being assumed bit-identical to it.

use crate::error::ChainError;
use crate::types::{BlockHeader, BurnBlockRow};

/// Result of one reverse scan over a block log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Canonical identity hashes, oldest first.
    pub index_block_hashes: Vec<String>,
    /// Canonical burn-block hashes, oldest first.
    pub burn_block_hashes: Vec<String>,
    pub canonical_stacks_block_count: u64,
    pub orphan_stacks_block_count: u64,
    pub canonical_burn_block_count: u64,
    pub orphan_burn_block_count: u64,
}

/// Reconstruct canonical status from a complete, time-ordered block log.
///
/// The last log entry seeds the expected head. A height gap between two
/// accepted blocks is a fatal inconsistency — the log cannot describe a
/// contiguous chain and no partial answer is returned.
pub fn scan_stacks_log(log: &[BlockHeader]) -> Result<ReplaySummary, ChainError> {
    let mut summary = ReplaySummary::default();
    let Some(last) = log.last() else {
        return Ok(summary);
    };

    let mut expected_hash = last.index_block_hash.clone();
    let mut expected_height = last.block_height;
    let mut found_head = false;
    let mut canonical: Vec<&BlockHeader> = Vec::new();

    for block in log.iter().rev() {
        let matches_head = block.index_block_hash == expected_hash;
        if matches_head {
            if found_head && block.block_height != expected_height {
                return Err(ChainError::InconsistentChain {
                    index_block_hash: block.index_block_hash.clone(),
                    expected_height,
                    actual_height: block.block_height,
                });
            }
            found_head = true;
            canonical.push(block);
            expected_hash = block.parent_index_block_hash.clone();
            expected_height = block.block_height.saturating_sub(1);
        } else {
            summary.orphan_stacks_block_count += 1;
            tracing::debug!(
                index_block_hash = %block.index_block_hash,
                height = block.block_height,
                "orphaned stacks block in replay"
            );
        }
    }

    canonical.reverse();
    summary.canonical_stacks_block_count = canonical.len() as u64;
    summary.index_block_hashes = canonical
        .iter()
        .map(|b| b.index_block_hash.clone())
        .collect();

    let (burn_hashes, orphan_burn) = scan_burn_log(
        &canonical
            .iter()
            .map(|b| BurnBlockRow {
                burn_block_hash: b.burn_block_hash.clone(),
                burn_block_height: b.burn_block_height,
            })
            .collect::<Vec<_>>(),
    );
    summary.canonical_burn_block_count = burn_hashes.len() as u64;
    summary.orphan_burn_block_count = orphan_burn;
    summary.burn_block_hashes = burn_hashes;

    Ok(summary)
}

/// Reverse scan over burn-block references, oldest-first input.
///
/// Walking backward, a burn block is accepted iff its height strictly
/// decreases the last accepted height; a repeat of the accepted hash at the
/// same height is collapsed (many Stacks blocks share one burn block), and
/// anything else is orphaned. Returns the canonical hashes oldest first plus
/// the orphan count.
pub fn scan_burn_log(log: &[BurnBlockRow]) -> (Vec<String>, u64) {
    let mut accepted: Vec<&BurnBlockRow> = Vec::new();
    let mut orphans = 0u64;

    for burn_block in log.iter().rev() {
        match accepted.last() {
            None => accepted.push(burn_block),
            Some(last) if burn_block.burn_block_height < last.burn_block_height => {
                accepted.push(burn_block);
            }
            Some(last)
                if burn_block.burn_block_height == last.burn_block_height
                    && burn_block.burn_block_hash == last.burn_block_hash =>
            {
                // Same burn block referenced by multiple Stacks blocks.
            }
            Some(_) => {
                orphans += 1;
                tracing::debug!(
                    hash = %burn_block.burn_block_hash,
                    height = burn_block.burn_block_height,
                    "orphaned burn block in replay"
                );
            }
        }
    }

    accepted.reverse();
    (
        accepted.iter().map(|b| b.burn_block_hash.clone()).collect(),
        orphans,
    )
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(height: u64, index_hash: &str, parent_index_hash: &str) -> BlockHeader {
        BlockHeader {
            index_block_hash: index_hash.into(),
            block_hash: format!("0xb{index_hash}"),
            parent_index_block_hash: parent_index_hash.into(),
            parent_block_hash: String::new(),
            block_height: height,
            burn_block_hash: format!("0xburn{height}"),
            burn_block_height: 700_000 + height,
            canonical: false,
        }
    }

    #[test]
    fn five_block_log_with_one_orphan() {
        // A(1)–B(2)–C(3)–E(4) canonical; D is an orphaned sibling of C.
        let log = vec![
            entry(1, "0xa", "0x0"),
            entry(2, "0xb", "0xa"),
            entry(3, "0xc", "0xb"),
            entry(3, "0xd", "0xb"),
            entry(4, "0xe", "0xc"),
        ];
        let summary = scan_stacks_log(&log).unwrap();
        assert_eq!(summary.orphan_stacks_block_count, 1);
        assert_eq!(summary.canonical_stacks_block_count, 4);
        assert_eq!(summary.index_block_hashes, ["0xa", "0xb", "0xc", "0xe"]);
    }

    #[test]
    fn empty_log() {
        let summary = scan_stacks_log(&[]).unwrap();
        assert_eq!(summary.canonical_stacks_block_count, 0);
        assert_eq!(summary.orphan_stacks_block_count, 0);
    }

    #[test]
    fn height_gap_is_fatal() {
        // B claims to be the parent-linked head but skips a height.
        let log = vec![
            entry(1, "0xa", "0x0"),
            {
                let mut bad = entry(4, "0xb", "0xa");
                bad.block_height = 4;
                bad
            },
            entry(5, "0xc", "0xb"),
        ];
        // Scan: C(5) head, expects B at 4 — fine; B expects A at 3, but A is 1.
        let err = scan_stacks_log(&log).unwrap_err();
        assert!(matches!(err, ChainError::InconsistentChain { .. }));
    }

    #[test]
    fn burn_scan_orphans_non_decreasing_height() {
        let log = vec![
            BurnBlockRow { burn_block_hash: "0xr1".into(), burn_block_height: 100 },
            BurnBlockRow { burn_block_hash: "0xr2".into(), burn_block_height: 101 },
            // Stale announcement at a height we've already passed.
            BurnBlockRow { burn_block_hash: "0xr2b".into(), burn_block_height: 101 },
            BurnBlockRow { burn_block_hash: "0xr3".into(), burn_block_height: 102 },
        ];
        let (hashes, orphans) = scan_burn_log(&log);
        // Backward: r3(102), r2b(101), then r2(101) is not decreasing → orphan.
        assert_eq!(orphans, 1);
        assert_eq!(hashes, ["0xr1", "0xr2b", "0xr3"]);
    }

    #[test]
    fn burn_scan_collapses_shared_burn_blocks() {
        let log = vec![
            BurnBlockRow { burn_block_hash: "0xr1".into(), burn_block_height: 100 },
            BurnBlockRow { burn_block_hash: "0xr2".into(), burn_block_height: 101 },
            BurnBlockRow { burn_block_hash: "0xr2".into(), burn_block_height: 101 },
        ];
        let (hashes, orphans) = scan_burn_log(&log);
        assert_eq!(orphans, 0);
        assert_eq!(hashes, ["0xr1", "0xr2"]);
    }

    #[test]
    fn stacks_scan_reports_burn_dimension() {
        let log = vec![
            entry(1, "0xa", "0x0"),
            entry(2, "0xb", "0xa"),
            entry(3, "0xc", "0xb"),
        ];
        let summary = scan_stacks_log(&log).unwrap();
        assert_eq!(summary.canonical_burn_block_count, 3);
        assert_eq!(summary.orphan_burn_block_count, 0);
        assert_eq!(
            summary.burn_block_hashes,
            ["0xburn1", "0xburn2", "0xburn3"]
        );
    }
}
