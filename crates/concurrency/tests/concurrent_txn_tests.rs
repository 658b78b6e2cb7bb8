//! Multi-threaded transaction scenarios.

use brine_concurrency::{LockManager, LockMode, TransactionManager};
use brine_durability::Wal;
use brine_storage::MemStore;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn managers(dir: &std::path::Path) -> (Arc<TransactionManager>, Arc<LockManager>, Arc<MemStore>) {
    let wal = Arc::new(Wal::open(dir).unwrap());
    let locks = Arc::new(LockManager::new());
    let store = Arc::new(MemStore::open(dir).unwrap());
    let txns = Arc::new(TransactionManager::new(wal, locks.clone(), store.clone()));
    (txns, locks, store)
}

#[test]
fn disjoint_keys_commit_concurrently() {
    let dir = tempdir().unwrap();
    let (txns, _, store) = managers(dir.path());

    let mut handles = Vec::new();
    for worker in 0..8u64 {
        let txns = Arc::clone(&txns);
        handles.push(thread::spawn(move || {
            for i in 0..20u64 {
                let key = format!("worker:{worker}:{i}");
                let txn = txns.begin().unwrap();
                txns.put(&txn, key.as_bytes(), b"x").unwrap();
                txns.commit(&txn).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 8 * 20);
}

#[test]
fn contended_key_serializes_and_loses_no_update() {
    let dir = tempdir().unwrap();
    let (txns, locks, store) = managers(dir.path());
    store.put(b"counter", b"0");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let txns = Arc::clone(&txns);
        let locks = Arc::clone(&locks);
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                let txn = txns.begin().unwrap();
                // Take the write lock before reading so the whole
                // read-modify-write is atomic under strict 2PL.
                locks.lock_exclusive(txn.id(), b"counter");
                let current: u64 = String::from_utf8(store.get(b"counter").unwrap())
                    .unwrap()
                    .parse()
                    .unwrap();
                let next = (current + 1).to_string();
                txns.put(&txn, b"counter", next.as_bytes()).unwrap();
                txns.commit(&txn).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let final_value: u64 = String::from_utf8(store.get(b"counter").unwrap())
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(final_value, 100);
}

#[test]
fn try_lock_conflict_until_first_writer_commits() {
    let dir = tempdir().unwrap();
    let (txns, locks, _) = managers(dir.path());

    let t1 = txns.begin().unwrap();
    let t2 = txns.begin().unwrap();

    txns.put(&t1, b"k", b"v1").unwrap();
    assert!(!locks.try_lock(t2.id(), b"k", LockMode::Exclusive));

    txns.commit(&t1).unwrap();
    assert!(locks.try_lock(t2.id(), b"k", LockMode::Exclusive));
    txns.put(&t2, b"k", b"v2").unwrap();
    txns.commit(&t2).unwrap();
}

#[test]
fn blocked_writer_proceeds_after_rollback() {
    let dir = tempdir().unwrap();
    let (txns, _, store) = managers(dir.path());

    let t1 = txns.begin().unwrap();
    txns.put(&t1, b"k", b"uncommitted").unwrap();

    let writer = {
        let txns = Arc::clone(&txns);
        thread::spawn(move || {
            let t2 = txns.begin().unwrap();
            txns.put(&t2, b"k", b"committed").unwrap();
            txns.commit(&t2).unwrap();
        })
    };

    thread::sleep(std::time::Duration::from_millis(50));
    txns.rollback(&t1).unwrap();
    writer.join().unwrap();

    assert_eq!(store.get(b"k"), Some(b"committed".to_vec()));
}

#[test]
fn counter_mix_of_commit_and_rollback() {
    let dir = tempdir().unwrap();
    let (txns, _, store) = managers(dir.path());

    // Interleave committed and rolled-back writes to the same key.
    for round in 0..10u32 {
        let txn = txns.begin().unwrap();
        let value = format!("round-{round}");
        txns.put(&txn, b"k", value.as_bytes()).unwrap();
        if round % 2 == 0 {
            txns.commit(&txn).unwrap();
        } else {
            txns.rollback(&txn).unwrap();
        }
    }

    // Rounds 8 was the last committed write; round 9 rolled back to it.
    assert_eq!(store.get(b"k"), Some(b"round-8".to_vec()));
}
