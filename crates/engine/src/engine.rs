//! The engine facade.
//!
//! Opens the subsystems in dependency order (store, WAL, recovery, locks,
//! transactions, checkpointing) and exposes the public key-value API. Each
//! public write runs as a single-statement transaction: begin, operate,
//! commit, with rollback on any failure. Reads bypass the transaction
//! manager and hit the store directly.

use crate::checkpoint::CheckpointManager;
use crate::stats::Statistics;
use brine_concurrency::{LockManager, TransactionManager};
use brine_core::{display_key, Error, Key, Result, Value};
use brine_durability::{RecoveryManager, Wal};
use brine_storage::{MemStore, Scan};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Durable transactional key-value engine.
///
/// Thread-safe: every method takes `&self` and the engine is routinely
/// shared behind an `Arc` by the network front-end.
pub struct Engine {
    data_dir: PathBuf,
    store: Arc<MemStore>,
    wal: Arc<Wal>,
    txns: Arc<TransactionManager>,
    checkpoint: CheckpointManager,
    total_reads: AtomicU64,
    total_writes: AtomicU64,
    closed: AtomicBool,
}

impl Engine {
    /// Open the engine rooted at `data_dir`.
    ///
    /// Loads the store snapshot, opens the WAL (trimming any torn tail),
    /// and runs recovery before any operation is served.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Engine> {
        let data_dir = data_dir.as_ref().to_path_buf();

        let store = Arc::new(MemStore::open(&data_dir)?);
        let wal = Arc::new(Wal::open(&data_dir)?);

        let report = RecoveryManager::new(&wal, &store).recover()?;
        if report.records_scanned > 0 {
            info!(
                committed = report.committed,
                losers = report.losers,
                redo = report.redo_applied,
                undo = report.undo_applied,
                "recovery replayed the WAL"
            );
        }

        let locks = Arc::new(LockManager::new());
        let txns = Arc::new(TransactionManager::new(wal.clone(), locks, store.clone()));
        let checkpoint = CheckpointManager::new(wal.clone(), txns.clone(), store.clone());

        info!(data_dir = %data_dir.display(), keys = store.len(), "engine open");
        Ok(Engine {
            data_dir,
            store,
            wal,
            txns,
            checkpoint,
            total_reads: AtomicU64::new(0),
            total_writes: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Directory this engine persists into.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Write one key durably.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.total_writes.fetch_add(1, Ordering::Relaxed);

        let txn = self.txns.begin()?;
        if let Err(e) = self.txns.put(&txn, key, value) {
            let _ = self.txns.rollback(&txn);
            return Err(e);
        }
        if let Err(e) = self.txns.commit(&txn) {
            let _ = self.txns.rollback(&txn);
            return Err(e);
        }
        Ok(())
    }

    /// Read one key. `Ok(None)` when absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        self.ensure_open()?;
        self.total_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.store.get(key))
    }

    /// Remove one key durably. Returns whether the key existed.
    pub fn remove(&self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        self.total_writes.fetch_add(1, Ordering::Relaxed);

        let txn = self.txns.begin()?;
        let removed = match self.txns.remove(&txn, key) {
            Ok(removed) => removed,
            Err(e) => {
                let _ = self.txns.rollback(&txn);
                return Err(e);
            }
        };
        if let Err(e) = self.txns.commit(&txn) {
            let _ = self.txns.rollback(&txn);
            return Err(e);
        }
        Ok(removed)
    }

    /// True if the key is present.
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        self.total_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.store.exists(key))
    }

    /// Write a batch of keys in one transaction: all become durable
    /// together or none do.
    ///
    /// Keys are applied in sorted order so concurrent batches cannot
    /// deadlock against each other.
    pub fn batch_put<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (Key, Value)>,
    {
        self.ensure_open()?;
        let batch: BTreeMap<Key, Value> = entries.into_iter().collect();
        if batch.is_empty() {
            return Ok(());
        }
        self.total_writes
            .fetch_add(batch.len() as u64, Ordering::Relaxed);

        let txn = self.txns.begin()?;
        for (key, value) in &batch {
            if let Err(e) = self.txns.put(&txn, key, value) {
                let _ = self.txns.rollback(&txn);
                return Err(e);
            }
        }
        if let Err(e) = self.txns.commit(&txn) {
            let _ = self.txns.rollback(&txn);
            return Err(e);
        }
        Ok(())
    }

    /// Snapshot iterator over keys starting with `prefix`, ascending.
    pub fn scan(&self, prefix: &[u8]) -> Result<Scan> {
        self.ensure_open()?;
        Ok(self.store.scan(prefix))
    }

    /// Current engine counters.
    pub fn statistics(&self) -> Statistics {
        Statistics {
            total_keys: self.store.len(),
            memory_used: self.store.memory_usage(),
            total_reads: self.total_reads.load(Ordering::Relaxed),
            total_writes: self.total_writes.load(Ordering::Relaxed),
        }
    }

    /// Checkpoint and flush the store snapshot.
    pub fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        self.checkpoint.create_checkpoint()?;
        self.store.flush()
    }

    /// Cross-check the store against itself and the WAL. Diagnostic.
    pub fn verify_integrity(&self) -> Result<bool> {
        self.ensure_open()?;

        for (key, _) in self.store.scan(b"") {
            if !self.store.exists(&key) {
                error!(key = %display_key(&key), "scan returned a key the store does not hold");
                return Ok(false);
            }
        }
        self.wal.verify()
    }

    /// Checkpoint, flush, and shut the engine down. Further operations
    /// fail with `NotOpen`. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.checkpoint.create_checkpoint()?;
        self.store.flush()?;
        self.wal.close()?;
        info!("engine closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::NotOpen)
        } else {
            Ok(())
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            if let Err(e) = self.close() {
                warn!("engine close during drop failed: {e}");
            }
        }
    }
}
