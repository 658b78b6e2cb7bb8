//! # BrineDB
//!
//! An embedded, durable, transactional key-value engine with a
//! Redis-wire network front-end.
//!
//! Byte-string keys map to byte-string values with single-writer durable
//! semantics: every write runs as a transaction under strict two-phase
//! locking, is logged to a checksummed write-ahead log before it touches
//! the store, and survives a crash through an analysis / redo / undo
//! recovery pass at the next open.
//!
//! # Quick Start
//!
//! ```no_run
//! use brinedb::Engine;
//!
//! fn main() -> brinedb::Result<()> {
//!     let engine = Engine::open("./my-data")?;
//!
//!     engine.put(b"user:name", b"Alice")?;
//!     assert_eq!(engine.get(b"user:name")?, Some(b"Alice".to_vec()));
//!
//!     // Prefix scans iterate a snapshot in key order.
//!     for (key, value) in engine.scan(b"user:")? {
//!         println!("{:?} = {:?}", key, value);
//!     }
//!
//!     // All-or-nothing multi-key writes.
//!     engine.batch_put(vec![
//!         (b"a".to_vec(), b"1".to_vec()),
//!         (b"b".to_vec(), b"2".to_vec()),
//!     ])?;
//!
//!     engine.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Crate | Responsibility |
//! |-------|----------------|
//! | `brine_core` | shared types, error taxonomy |
//! | `brine_storage` | ordered in-memory store, snapshot file |
//! | `brine_durability` | WAL framing, append log, recovery |
//! | `brine_concurrency` | shared/exclusive locks, transactions |
//! | `brine_engine` | facade, checkpointing, statistics |
//! | `brine_wire` | RESP framing and command dispatch |
//! | `brine_server` / `brine_cli` | network server and client binaries |
//!
//! On disk a database is a directory holding `kvengine.dat` (the store
//! snapshot) and `wal.log` (the write-ahead log). A checkpoint flushes
//! the snapshot and truncates the log prefix that recovery no longer
//! needs.

pub use brine_core::{Error, Key, Lsn, Result, TxnId, Value};
pub use brine_engine::{Engine, Statistics};
pub use brine_storage::Scan;
