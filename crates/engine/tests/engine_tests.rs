//! Engine facade behavior through the public API.

use brine_engine::Engine;
use tempfile::tempdir;

#[test]
fn basic_crud_cycle() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();

    engine.put(b"k", b"v").unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
    assert!(engine.exists(b"k").unwrap());

    assert!(engine.remove(b"k").unwrap());
    assert!(!engine.exists(b"k").unwrap());
    assert_eq!(engine.get(b"k").unwrap(), None);

    engine.close().unwrap();
}

#[test]
fn persistence_across_close_and_open() {
    let dir = tempdir().unwrap();
    {
        let engine = Engine::open(dir.path()).unwrap();
        engine.put(b"a", b"1").unwrap();
        engine.put(b"b", b"2").unwrap();
        engine.put(b"c", b"3").unwrap();
        engine.flush().unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(dir.path()).unwrap();
    assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.get(b"c").unwrap(), Some(b"3".to_vec()));
}

#[test]
fn remove_missing_key_reports_false() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    assert!(!engine.remove(b"ghost").unwrap());
}

#[test]
fn batch_put_is_atomic_and_visible() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();

    engine
        .batch_put(vec![
            (b"x".to_vec(), b"1".to_vec()),
            (b"y".to_vec(), b"2".to_vec()),
            (b"z".to_vec(), b"3".to_vec()),
        ])
        .unwrap();

    assert_eq!(engine.get(b"x").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"y").unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.get(b"z").unwrap(), Some(b"3".to_vec()));
}

#[test]
fn batch_put_empty_is_a_no_op() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    engine.batch_put(Vec::new()).unwrap();
    assert_eq!(engine.statistics().total_keys, 0);
}

#[test]
fn scan_returns_prefix_matches_in_order() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();

    engine.put(b"user:2", b"b").unwrap();
    engine.put(b"user:1", b"a").unwrap();
    engine.put(b"other", b"x").unwrap();

    let keys: Vec<_> = engine.scan(b"user:").unwrap().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"user:1".to_vec(), b"user:2".to_vec()]);
}

#[test]
fn scan_snapshot_ignores_later_writes() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();

    engine.put(b"a", b"1").unwrap();
    engine.put(b"b", b"2").unwrap();

    let scan = engine.scan(b"").unwrap();
    engine.put(b"c", b"3").unwrap();
    engine.remove(b"a").unwrap();

    let seen: Vec<_> = scan.map(|(k, _)| k).collect();
    assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn statistics_track_activity() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();

    engine.put(b"k1", b"hello").unwrap();
    engine.put(b"k2", b"world").unwrap();
    engine.get(b"k1").unwrap();
    engine.exists(b"k2").unwrap();
    engine.get(b"missing").unwrap();

    let stats = engine.statistics();
    assert_eq!(stats.total_keys, 2);
    assert_eq!(stats.total_writes, 2);
    assert_eq!(stats.total_reads, 3);
    assert_eq!(stats.memory_used, b"k1hello".len() + b"k2world".len());
}

#[test]
fn operations_after_close_fail() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    engine.close().unwrap();

    assert!(engine.put(b"k", b"v").is_err());
    assert!(engine.get(b"k").is_err());
    // Close is idempotent.
    engine.close().unwrap();
}

#[test]
fn verify_integrity_on_healthy_engine() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    engine.put(b"a", b"1").unwrap();
    engine.put(b"b", b"2").unwrap();
    assert!(engine.verify_integrity().unwrap());
}

#[test]
fn concurrent_writers_on_disjoint_keys() {
    use std::sync::Arc;
    use std::thread;

    let dir = tempdir().unwrap();
    let engine = Arc::new(Engine::open(dir.path()).unwrap());

    let mut handles = Vec::new();
    for worker in 0..4u32 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..50u32 {
                let key = format!("w{worker}:k{i}");
                engine.put(key.as_bytes(), b"v").unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.statistics().total_keys, 200);
}
