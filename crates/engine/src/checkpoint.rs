//! Checkpointing: advance the durability boundary and shrink the WAL.
//!
//! A checkpoint makes the store snapshot durable, records which
//! transactions were active at that moment, and discards the WAL prefix
//! that recovery will never need again:
//!
//! 1. flush the store snapshot
//! 2. collect the active transaction list
//! 3. append a Checkpoint record carrying that list, fsync
//! 4. truncate the WAL below `min(checkpoint lsn, oldest active start lsn)`
//!
//! Keeping every active transaction's records ensures a post-crash undo
//! still finds their pre-images; redo restarts from the checkpoint because
//! the snapshot already covers everything before it.

use brine_concurrency::TransactionManager;
use brine_core::{Lsn, Result};
use brine_durability::{LogRecord, Wal};
use brine_storage::MemStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Serializes checkpoint creation; holds no other state.
pub struct CheckpointManager {
    wal: Arc<Wal>,
    txns: Arc<TransactionManager>,
    store: Arc<MemStore>,
    guard: Mutex<()>,
}

impl CheckpointManager {
    /// Wire the checkpoint manager to its collaborators.
    pub fn new(wal: Arc<Wal>, txns: Arc<TransactionManager>, store: Arc<MemStore>) -> Self {
        CheckpointManager {
            wal,
            txns,
            store,
            guard: Mutex::new(()),
        }
    }

    /// Take a checkpoint. Returns the LSN of the Checkpoint record.
    pub fn create_checkpoint(&self) -> Result<Lsn> {
        let _guard = self.guard.lock();

        // The snapshot must be durable before any WAL prefix is dropped.
        self.store.flush()?;

        let active = self.txns.active_transactions();
        let list = active
            .iter()
            .map(|t| t.txn_id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut record = LogRecord::checkpoint(list.into_bytes());
        let cp_lsn = self.wal.append(&mut record)?;
        self.wal.flush()?;

        let mut min_lsn = cp_lsn;
        for txn in &active {
            if txn.start_lsn > 0 && txn.start_lsn < min_lsn {
                min_lsn = txn.start_lsn;
            }
        }
        if min_lsn > 1 {
            self.wal.truncate(min_lsn)?;
        }

        info!(cp_lsn, min_lsn, active = active.len(), "checkpoint created");
        Ok(cp_lsn)
    }
}
