//! Crash recovery over the write-ahead log.
//!
//! Runs exactly once at engine open, after the store snapshot is loaded and
//! the WAL has trimmed its torn tail. Three phases:
//!
//! 1. **Analysis**: forward scan sorting transactions into winners
//!    (Commit seen), explicitly aborted (Rollback seen), and losers (still
//!    running at the crash). The most recent Checkpoint record seeds the
//!    loser set with the transactions that were active when it was taken.
//! 2. **Redo**: repeat history. Every Put and Delete after the checkpoint
//!    is re-applied to the store, including those of losers. Records at or
//!    before the checkpoint are skipped; the snapshot already reflects
//!    them.
//! 3. **Undo**: backward scan reversing every loser operation using the
//!    pre-image carried in the record: restore the old value if the key
//!    existed, remove the key if it did not.
//!
//! Running recovery twice over the same log yields the same store state.

use crate::record::RecordType;
use crate::wal::Wal;
use brine_core::{display_key, Lsn, Result, TxnId};
use brine_storage::MemStore;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome counters from a recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Records scanned from the WAL.
    pub records_scanned: usize,
    /// LSN of the checkpoint used to bound redo, if any.
    pub checkpoint_lsn: Option<Lsn>,
    /// Transactions with a durable Commit.
    pub committed: usize,
    /// Transactions with a durable Rollback.
    pub aborted: usize,
    /// Transactions still running at the crash.
    pub losers: usize,
    /// Put/Delete operations re-applied during redo.
    pub redo_applied: usize,
    /// Loser operations reversed during undo.
    pub undo_applied: usize,
}

/// Drives the three-phase recovery pass against a WAL and a store.
pub struct RecoveryManager<'a> {
    wal: &'a Wal,
    store: &'a MemStore,
}

impl<'a> RecoveryManager<'a> {
    /// Pair a WAL with the store it recovers into.
    pub fn new(wal: &'a Wal, store: &'a MemStore) -> Self {
        RecoveryManager { wal, store }
    }

    /// Run analysis, redo and undo. Returns counters for logging.
    pub fn recover(&self) -> Result<RecoveryReport> {
        let records = self.wal.read_from(1)?;
        if records.is_empty() {
            debug!("empty WAL, nothing to recover");
            return Ok(RecoveryReport::default());
        }

        let mut report = RecoveryReport {
            records_scanned: records.len(),
            ..RecoveryReport::default()
        };

        // Most recent checkpoint bounds redo and seeds the active set.
        let mut checkpoint_lsn = 0u64;
        let mut active: HashSet<TxnId> = HashSet::new();
        for record in &records {
            if record.record_type == RecordType::Checkpoint {
                checkpoint_lsn = record.lsn;
                active = parse_txn_list(&record.value);
            }
        }
        if checkpoint_lsn > 0 {
            report.checkpoint_lsn = Some(checkpoint_lsn);
        }

        // Analysis.
        let mut committed: HashSet<TxnId> = HashSet::new();
        let mut aborted: HashSet<TxnId> = HashSet::new();
        for record in records.iter().filter(|r| r.lsn > checkpoint_lsn) {
            match record.record_type {
                RecordType::Begin => {
                    active.insert(record.txn_id);
                }
                RecordType::Commit => {
                    active.remove(&record.txn_id);
                    committed.insert(record.txn_id);
                }
                RecordType::Rollback => {
                    active.remove(&record.txn_id);
                    aborted.insert(record.txn_id);
                }
                _ => {}
            }
        }
        report.committed = committed.len();
        report.aborted = aborted.len();
        report.losers = active.len();
        info!(
            committed = report.committed,
            aborted = report.aborted,
            losers = report.losers,
            checkpoint_lsn,
            "recovery analysis complete"
        );

        // Redo: repeat history after the checkpoint, losers included.
        for record in records.iter().filter(|r| r.lsn > checkpoint_lsn) {
            match record.record_type {
                RecordType::Put => {
                    self.store.put(&record.key, &record.value);
                    report.redo_applied += 1;
                }
                RecordType::Delete => {
                    self.store.remove(&record.key);
                    report.redo_applied += 1;
                }
                _ => {}
            }
        }

        // Undo: reverse loser operations, newest first.
        for record in records.iter().rev() {
            if !active.contains(&record.txn_id) {
                continue;
            }
            match record.record_type {
                RecordType::Put => {
                    match &record.prev {
                        Some(old) => self.store.put(&record.key, old),
                        None => {
                            self.store.remove(&record.key);
                        }
                    }
                    report.undo_applied += 1;
                }
                RecordType::Delete => match &record.prev {
                    Some(old) => {
                        self.store.put(&record.key, old);
                        report.undo_applied += 1;
                    }
                    None => {
                        // A delete of an absent key is never logged, so this
                        // only appears in logs written by older builds.
                        warn!(
                            txn_id = record.txn_id,
                            key = %display_key(&record.key),
                            "cannot undo delete without a pre-image"
                        );
                    }
                },
                _ => {}
            }
        }

        info!(
            redo = report.redo_applied,
            undo = report.undo_applied,
            "recovery complete"
        );
        Ok(report)
    }
}

/// Parse the comma-separated transaction id list from a Checkpoint record.
fn parse_txn_list(value: &[u8]) -> HashSet<TxnId> {
    let text = String::from_utf8_lossy(value);
    text.split(',')
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.trim().parse::<TxnId>().ok())
        .collect()
}
