//! Crash simulation through the facade.
//!
//! A "crash" leaks the engine with `std::mem::forget`, which skips the
//! close-time checkpoint and store flush exactly as a killed process
//! would. Reopening then exercises the full recovery path.

use brine_concurrency::{LockManager, TransactionManager};
use brine_durability::Wal;
use brine_engine::Engine;
use brine_storage::MemStore;
use std::mem;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn committed_put_survives_a_crash_without_flush() {
    let dir = tempdir().unwrap();
    {
        let engine = Engine::open(dir.path()).unwrap();
        engine.put(b"k", b"v").unwrap();
        // Kill the process before any checkpoint or store flush.
        mem::forget(engine);
    }

    let engine = Engine::open(dir.path()).unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn committed_remove_survives_a_crash() {
    let dir = tempdir().unwrap();
    {
        let engine = Engine::open(dir.path()).unwrap();
        engine.put(b"k", b"v").unwrap();
        engine.flush().unwrap();
        assert!(engine.remove(b"k").unwrap());
        mem::forget(engine);
    }

    let engine = Engine::open(dir.path()).unwrap();
    assert!(!engine.exists(b"k").unwrap());
}

#[test]
fn uncommitted_transaction_is_undone_on_reopen() {
    let dir = tempdir().unwrap();
    {
        // Drive the transaction manager directly so the transaction is
        // still running when the "process" dies.
        let wal = Arc::new(Wal::open(dir.path()).unwrap());
        let locks = Arc::new(LockManager::new());
        let store = Arc::new(MemStore::open(dir.path()).unwrap());
        let txns = TransactionManager::new(wal.clone(), locks, store);

        let txn = txns.begin().unwrap();
        txns.put(&txn, b"kx", b"vx").unwrap();
        wal.flush().unwrap();
        // No commit, no rollback: crash.
    }

    let engine = Engine::open(dir.path()).unwrap();
    assert!(!engine.exists(b"kx").unwrap());
}

#[test]
fn crash_between_checkpoint_and_commit_keeps_both_sides_consistent() {
    let dir = tempdir().unwrap();
    {
        let engine = Engine::open(dir.path()).unwrap();
        engine.put(b"before", b"1").unwrap();
        engine.flush().unwrap();
        engine.put(b"after", b"2").unwrap();
        mem::forget(engine);
    }

    let engine = Engine::open(dir.path()).unwrap();
    assert_eq!(engine.get(b"before").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"after").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn repeated_crashes_converge() {
    let dir = tempdir().unwrap();
    {
        let engine = Engine::open(dir.path()).unwrap();
        engine.put(b"stable", b"s").unwrap();
        mem::forget(engine);
    }
    for _ in 0..3 {
        let engine = Engine::open(dir.path()).unwrap();
        assert_eq!(engine.get(b"stable").unwrap(), Some(b"s".to_vec()));
        mem::forget(engine);
    }

    let engine = Engine::open(dir.path()).unwrap();
    assert_eq!(engine.get(b"stable").unwrap(), Some(b"s".to_vec()));
    assert_eq!(engine.statistics().total_keys, 1);
}

#[test]
fn overwrites_replay_to_the_last_committed_value() {
    let dir = tempdir().unwrap();
    {
        let engine = Engine::open(dir.path()).unwrap();
        for i in 0..10u32 {
            engine.put(b"k", i.to_string().as_bytes()).unwrap();
        }
        mem::forget(engine);
    }

    let engine = Engine::open(dir.path()).unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"9".to_vec()));
}

#[test]
fn batch_survives_crash_atomically() {
    let dir = tempdir().unwrap();
    {
        let engine = Engine::open(dir.path()).unwrap();
        engine
            .batch_put(vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
            ])
            .unwrap();
        mem::forget(engine);
    }

    let engine = Engine::open(dir.path()).unwrap();
    assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
}
