//! Transaction manager.
//!
//! Coordinates the write path: strict two-phase locking through the lock
//! manager, WAL ordering (log before apply), in-place application to the
//! store, and lock release at commit or rollback.
//!
//! ## Commit sequence
//!
//! ```text
//! begin:    allocate txn id, log Begin, enter the active table
//! put:      X-lock key, log Put (with pre-image), apply to store
//! remove:   X-lock key, log Delete (with pre-image), apply to store
//! commit:   log Commit, fsync WAL (DURABILITY POINT), release locks
//! rollback: restore pre-images newest-first, logging each compensating
//!           operation, log Rollback, fsync, release locks
//! ```
//!
//! Rollback logs its compensating operations as ordinary Put/Delete
//! records. Recovery redo repeats history literally, so a rolled-back
//! transaction whose records survive in the log nets out to nothing, and a
//! crash in the middle of a rollback leaves a loser that undo finishes
//! reversing from the pre-images.
//!
//! Writes mutate the store before commit, so concurrent readers outside
//! the transaction manager can observe uncommitted data. The engine facade
//! only issues single-statement transactions, which keeps that window
//! private to multi-key batches.

use crate::lock::LockManager;
use crate::transaction::Transaction;
use brine_core::{Error, Key, Lsn, Result, TxnId, Value};
use brine_durability::{LogRecord, Wal};
use brine_storage::MemStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A transaction that was active at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveTxn {
    /// Transaction identifier.
    pub txn_id: TxnId,
    /// LSN of its Begin record.
    pub start_lsn: Lsn,
}

/// One reversible operation, recorded in execution order.
struct UndoEntry {
    key: Key,
    /// Value before the operation; None if the key did not exist.
    prev: Option<Value>,
}

struct TxnEntry {
    start_lsn: Lsn,
    undo: Vec<UndoEntry>,
}

/// Transaction lifecycle and write coordination.
pub struct TransactionManager {
    wal: Arc<Wal>,
    locks: Arc<LockManager>,
    store: Arc<MemStore>,
    next_txn_id: AtomicU64,
    active: Mutex<HashMap<TxnId, TxnEntry>>,
}

impl TransactionManager {
    /// Wire the manager to its collaborators.
    pub fn new(wal: Arc<Wal>, locks: Arc<LockManager>, store: Arc<MemStore>) -> Self {
        TransactionManager {
            wal,
            locks,
            store,
            next_txn_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Start a transaction: allocate the next id, log Begin, and enter the
    /// active table.
    pub fn begin(&self) -> Result<Transaction> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);

        let mut record = LogRecord::begin(txn_id);
        let start_lsn = self.wal.append(&mut record)?;

        self.active.lock().insert(
            txn_id,
            TxnEntry {
                start_lsn,
                undo: Vec::new(),
            },
        );
        debug!(txn_id, start_lsn, "transaction started");
        Ok(Transaction::new(txn_id, start_lsn))
    }

    /// Write a key inside the transaction.
    ///
    /// Blocks until the exclusive lock is granted. On failure after the
    /// lock is held, the caller is expected to roll back; the lock stays
    /// held until then.
    pub fn put(&self, txn: &Transaction, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_running(txn)?;
        self.locks.lock_exclusive(txn.id(), key);

        let prev = self.store.get(key);
        let mut record = LogRecord::put(txn.id(), key, value, prev.clone());
        self.wal.append(&mut record)?;

        self.store.put(key, value);
        self.record_undo(txn, key, prev)?;
        Ok(())
    }

    /// Remove a key inside the transaction.
    ///
    /// Returns false (and logs nothing) when the key does not exist.
    pub fn remove(&self, txn: &Transaction, key: &[u8]) -> Result<bool> {
        self.ensure_running(txn)?;
        self.locks.lock_exclusive(txn.id(), key);

        let Some(prev) = self.store.get(key) else {
            return Ok(false);
        };
        let mut record = LogRecord::delete(txn.id(), key, Some(prev.clone()));
        self.wal.append(&mut record)?;

        self.store.remove(key);
        self.record_undo(txn, key, Some(prev))?;
        Ok(true)
    }

    /// Commit: log Commit, fsync the WAL, release all locks.
    ///
    /// A successful return means every record of this transaction is on
    /// disk.
    pub fn commit(&self, txn: &Transaction) -> Result<()> {
        self.ensure_running(txn)?;

        let mut record = LogRecord::commit(txn.id());
        self.wal.append(&mut record)?;
        self.wal.flush()?;

        self.active.lock().remove(&txn.id());
        self.locks.unlock_all(txn.id());
        debug!(txn_id = txn.id(), "transaction committed");
        Ok(())
    }

    /// Roll back: restore every written key to its pre-image, newest
    /// first, logging the compensating operations, then log Rollback and
    /// release all locks.
    pub fn rollback(&self, txn: &Transaction) -> Result<()> {
        let entry = self
            .active
            .lock()
            .remove(&txn.id())
            .ok_or(Error::TransactionNotActive { txn_id: txn.id() })?;

        let mut result = self.undo_writes(txn.id(), &entry);

        let mut record = LogRecord::rollback(txn.id());
        if let Err(e) = self
            .wal
            .append(&mut record)
            .and_then(|_| self.wal.flush())
        {
            error!(txn_id = txn.id(), "failed to log rollback: {e}");
            result = result.and(Err(e));
        }

        self.locks.unlock_all(txn.id());
        debug!(txn_id = txn.id(), "transaction rolled back");
        result
    }

    fn undo_writes(&self, txn_id: TxnId, entry: &TxnEntry) -> Result<()> {
        for undo in entry.undo.iter().rev() {
            let current = self.store.get(&undo.key);
            match &undo.prev {
                Some(old) => {
                    let mut record = LogRecord::put(txn_id, &undo.key, old, current);
                    self.wal.append(&mut record)?;
                    self.store.put(&undo.key, old);
                }
                None => {
                    let mut record = LogRecord::delete(txn_id, &undo.key, current);
                    self.wal.append(&mut record)?;
                    self.store.remove(&undo.key);
                }
            }
        }
        Ok(())
    }

    /// Transactions currently in the active table, for checkpointing.
    pub fn active_transactions(&self) -> Vec<ActiveTxn> {
        let active = self.active.lock();
        let mut txns: Vec<ActiveTxn> = active
            .iter()
            .map(|(&txn_id, entry)| ActiveTxn {
                txn_id,
                start_lsn: entry.start_lsn,
            })
            .collect();
        txns.sort_by_key(|t| t.txn_id);
        txns
    }

    fn ensure_running(&self, txn: &Transaction) -> Result<()> {
        if self.active.lock().contains_key(&txn.id()) {
            Ok(())
        } else {
            warn!(txn_id = txn.id(), "operation on inactive transaction");
            Err(Error::TransactionNotActive { txn_id: txn.id() })
        }
    }

    fn record_undo(&self, txn: &Transaction, key: &[u8], prev: Option<Value>) -> Result<()> {
        let mut active = self.active.lock();
        let entry = active
            .get_mut(&txn.id())
            .ok_or(Error::TransactionNotActive { txn_id: txn.id() })?;
        entry.undo.push(UndoEntry {
            key: key.to_vec(),
            prev,
        });
        Ok(())
    }
}
