//! Per-key shared/exclusive lock manager.
//!
//! One mutex and one condition variable protect the whole lock table.
//! Each key maps to an ordered request list reflecting arrival order; a
//! secondary index from transaction id to held keys accelerates bulk
//! release at commit and rollback.
//!
//! # Grant rules
//!
//! A request is grantable when every granted request from another
//! transaction is compatible with it (shared pairs only), and no
//! incompatible request from another transaction is queued ahead of it.
//! The queue position rule keeps grants FIFO per key: a waiting exclusive
//! is never bypassed by a later shared, so writers do not starve.
//!
//! A transaction's own requests never conflict with each other. Holding an
//! exclusive lock satisfies any further request; the sole shared holder of
//! a key may upgrade to exclusive in place.
//!
//! # Blocking
//!
//! `lock_shared` and `lock_exclusive` are the only operations in the
//! system that block indefinitely. Waiters park on the shared condition
//! variable and re-check their own request after every release broadcast.
//! There is no deadlock detection and no timeout: a cyclic wait blocks
//! forever, and callers keep liveness by acquiring keys in a consistent
//! order.

use brine_core::{Key, TxnId};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Lock mode for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared read lock. Compatible with other shared locks.
    Shared,
    /// Exclusive write lock. Compatible with nothing.
    Exclusive,
}

fn compatible(a: LockMode, b: LockMode) -> bool {
    a == LockMode::Shared && b == LockMode::Shared
}

#[derive(Debug)]
struct LockRequest {
    txn_id: TxnId,
    mode: LockMode,
    granted: bool,
}

#[derive(Default)]
struct LockTables {
    /// Per-key request queue, in arrival order.
    table: HashMap<Key, Vec<LockRequest>>,
    /// Keys on which each transaction holds or awaits locks.
    txn_locks: HashMap<TxnId, HashSet<Key>>,
}

/// Shared/exclusive point locks with FIFO waiting.
pub struct LockManager {
    tables: Mutex<LockTables>,
    released: Condvar,
}

impl LockManager {
    /// Empty lock table.
    pub fn new() -> Self {
        LockManager {
            tables: Mutex::new(LockTables::default()),
            released: Condvar::new(),
        }
    }

    /// Acquire a shared lock, blocking until granted.
    pub fn lock_shared(&self, txn_id: TxnId, key: &[u8]) {
        self.lock(txn_id, key, LockMode::Shared);
    }

    /// Acquire an exclusive lock, blocking until granted.
    ///
    /// A transaction that is the sole shared holder of the key upgrades in
    /// place; with other shared holders present it waits for them to
    /// release.
    pub fn lock_exclusive(&self, txn_id: TxnId, key: &[u8]) {
        self.lock(txn_id, key, LockMode::Exclusive);
    }

    fn lock(&self, txn_id: TxnId, key: &[u8], mode: LockMode) {
        let mut tables = self.tables.lock();

        if Self::already_holds(&tables, txn_id, key, mode) {
            return;
        }

        let granted = match tables.table.get(key) {
            Some(queue) => Self::grantable(queue, queue.len(), txn_id, mode),
            None => true,
        };
        tables.table.entry(key.to_vec()).or_default().push(LockRequest {
            txn_id,
            mode,
            granted,
        });
        tables
            .txn_locks
            .entry(txn_id)
            .or_default()
            .insert(key.to_vec());
        if granted {
            return;
        }

        // Queued behind incompatible holders or waiters; park until a
        // release grants our request.
        trace!(txn_id, ?mode, "lock wait");
        loop {
            self.released.wait(&mut tables);
            if Self::is_granted(&tables, txn_id, key, mode) {
                return;
            }
        }
    }

    /// Non-blocking acquire. Returns false if the lock is not immediately
    /// grantable; no request is queued in that case.
    pub fn try_lock(&self, txn_id: TxnId, key: &[u8], mode: LockMode) -> bool {
        let mut tables = self.tables.lock();

        if Self::already_holds(&tables, txn_id, key, mode) {
            return true;
        }

        let granted = match tables.table.get(key) {
            Some(queue) => Self::grantable(queue, queue.len(), txn_id, mode),
            None => true,
        };
        if !granted {
            return false;
        }
        tables.table.entry(key.to_vec()).or_default().push(LockRequest {
            txn_id,
            mode,
            granted: true,
        });
        tables
            .txn_locks
            .entry(txn_id)
            .or_default()
            .insert(key.to_vec());
        true
    }

    /// Release this transaction's lock on one key and wake waiters.
    pub fn unlock(&self, txn_id: TxnId, key: &[u8]) {
        let mut tables = self.tables.lock();
        Self::release_key(&mut tables, txn_id, key);
        if let Some(keys) = tables.txn_locks.get_mut(&txn_id) {
            keys.remove(key);
            if keys.is_empty() {
                tables.txn_locks.remove(&txn_id);
            }
        }
        self.released.notify_all();
    }

    /// Release every lock held by this transaction.
    pub fn unlock_all(&self, txn_id: TxnId) {
        let mut tables = self.tables.lock();
        let Some(keys) = tables.txn_locks.remove(&txn_id) else {
            return;
        };
        for key in keys {
            Self::release_key(&mut tables, txn_id, &key);
        }
        self.released.notify_all();
    }

    /// True if the transaction currently holds a granted lock on `key`
    /// that covers `mode`.
    pub fn holds_lock(&self, txn_id: TxnId, key: &[u8], mode: LockMode) -> bool {
        let tables = self.tables.lock();
        Self::already_holds(&tables, txn_id, key, mode)
    }

    /// Number of keys with at least one request. Diagnostic.
    pub fn locked_keys(&self) -> usize {
        self.tables.lock().table.len()
    }

    fn release_key(tables: &mut LockTables, txn_id: TxnId, key: &[u8]) {
        let Some(queue) = tables.table.get_mut(key) else {
            return;
        };
        queue.retain(|r| r.txn_id != txn_id);
        if queue.is_empty() {
            tables.table.remove(key);
            return;
        }
        Self::wake_key(queue);
    }

    /// Grant waiting requests in arrival order, stopping at the first that
    /// still cannot be granted.
    fn wake_key(queue: &mut Vec<LockRequest>) {
        for i in 0..queue.len() {
            if queue[i].granted {
                continue;
            }
            let (txn_id, mode) = (queue[i].txn_id, queue[i].mode);
            if Self::grantable(queue, i, txn_id, mode) {
                queue[i].granted = true;
                trace!(txn_id, ?mode, "lock granted after wait");
            } else {
                break;
            }
        }
    }

    /// Whether a request by `txn_id` for `mode`, queued at position
    /// `position`, can be granted right now. Requests from the same
    /// transaction never conflict.
    fn grantable(queue: &[LockRequest], position: usize, txn_id: TxnId, mode: LockMode) -> bool {
        for (i, request) in queue.iter().enumerate() {
            if request.txn_id == txn_id {
                continue;
            }
            if request.granted {
                if !compatible(mode, request.mode) {
                    return false;
                }
            } else if i < position && !compatible(mode, request.mode) {
                // FIFO: an incompatible waiter queued earlier keeps its turn.
                return false;
            }
        }
        true
    }

    fn already_holds(tables: &LockTables, txn_id: TxnId, key: &[u8], mode: LockMode) -> bool {
        let Some(queue) = tables.table.get(key) else {
            return false;
        };
        queue.iter().any(|r| {
            r.txn_id == txn_id
                && r.granted
                && (r.mode == LockMode::Exclusive || mode == LockMode::Shared)
        })
    }

    fn is_granted(tables: &LockTables, txn_id: TxnId, key: &[u8], mode: LockMode) -> bool {
        Self::already_holds(tables, txn_id, key, mode)
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn shared_locks_coexist() {
        let locks = LockManager::new();
        locks.lock_shared(1, b"k");
        locks.lock_shared(2, b"k");
        assert!(locks.holds_lock(1, b"k", LockMode::Shared));
        assert!(locks.holds_lock(2, b"k", LockMode::Shared));
    }

    #[test]
    fn exclusive_blocks_everyone_else() {
        let locks = LockManager::new();
        locks.lock_exclusive(1, b"k");
        assert!(!locks.try_lock(2, b"k", LockMode::Shared));
        assert!(!locks.try_lock(2, b"k", LockMode::Exclusive));
    }

    #[test]
    fn shared_blocks_foreign_exclusive() {
        let locks = LockManager::new();
        locks.lock_shared(1, b"k");
        assert!(!locks.try_lock(2, b"k", LockMode::Exclusive));
    }

    #[test]
    fn same_txn_is_self_compatible() {
        let locks = LockManager::new();
        locks.lock_exclusive(1, b"k");
        assert!(locks.try_lock(1, b"k", LockMode::Shared));
        assert!(locks.try_lock(1, b"k", LockMode::Exclusive));
    }

    #[test]
    fn sole_shared_holder_upgrades() {
        let locks = LockManager::new();
        locks.lock_shared(1, b"k");
        assert!(locks.try_lock(1, b"k", LockMode::Exclusive));
        assert!(locks.holds_lock(1, b"k", LockMode::Exclusive));
        // Another reader is now shut out.
        assert!(!locks.try_lock(2, b"k", LockMode::Shared));
    }

    #[test]
    fn upgrade_denied_with_other_sharers() {
        let locks = LockManager::new();
        locks.lock_shared(1, b"k");
        locks.lock_shared(2, b"k");
        assert!(!locks.try_lock(1, b"k", LockMode::Exclusive));
    }

    #[test]
    fn unlock_wakes_a_blocked_writer() {
        let locks = Arc::new(LockManager::new());
        locks.lock_exclusive(1, b"k");

        let acquired = Arc::new(AtomicBool::new(false));
        let handle = {
            let locks = Arc::clone(&locks);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                locks.lock_exclusive(2, b"k");
                acquired.store(true, Ordering::SeqCst);
                locks.unlock_all(2);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst), "writer jumped the lock");

        locks.unlock_all(1);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn exclusive_is_not_bypassed_by_later_shared() {
        let locks = Arc::new(LockManager::new());
        locks.lock_shared(1, b"k");

        // Writer queues behind the reader.
        let writer = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                locks.lock_exclusive(2, b"k");
                locks.unlock_all(2);
            })
        };
        thread::sleep(Duration::from_millis(50));

        // A later shared must not cut in front of the waiting writer.
        assert!(!locks.try_lock(3, b"k", LockMode::Shared));

        locks.unlock_all(1);
        writer.join().unwrap();

        // Once the writer has come and gone the reader gets in.
        assert!(locks.try_lock(3, b"k", LockMode::Shared));
    }

    #[test]
    fn try_lock_conflict_then_success_after_release() {
        let locks = LockManager::new();
        locks.lock_exclusive(1, b"k");
        assert!(!locks.try_lock(2, b"k", LockMode::Exclusive));
        locks.unlock_all(1);
        assert!(locks.try_lock(2, b"k", LockMode::Exclusive));
    }

    #[test]
    fn disjoint_keys_never_contend() {
        let locks = LockManager::new();
        locks.lock_exclusive(1, b"a");
        locks.lock_exclusive(2, b"b");
        assert!(locks.holds_lock(1, b"a", LockMode::Exclusive));
        assert!(locks.holds_lock(2, b"b", LockMode::Exclusive));
    }

    #[test]
    fn unlock_all_releases_every_key() {
        let locks = LockManager::new();
        locks.lock_exclusive(1, b"a");
        locks.lock_exclusive(1, b"b");
        locks.lock_shared(1, b"c");
        locks.unlock_all(1);
        assert_eq!(locks.locked_keys(), 0);
        assert!(locks.try_lock(2, b"a", LockMode::Exclusive));
    }

    #[test]
    fn waiters_granted_in_arrival_order() {
        let locks = Arc::new(LockManager::new());
        locks.lock_exclusive(1, b"k");

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for txn in [2u64, 3u64] {
            let locks = Arc::clone(&locks);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                locks.lock_exclusive(txn, b"k");
                order.lock().push(txn);
                // Hold briefly so the grant order is observable.
                thread::sleep(Duration::from_millis(10));
                locks.unlock_all(txn);
            }));
            // Stagger arrival so queue order is deterministic.
            thread::sleep(Duration::from_millis(50));
        }

        locks.unlock_all(1);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*order.lock(), vec![2, 3]);
    }
}
