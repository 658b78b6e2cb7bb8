//! Durability layer for BrineDB.
//!
//! - `record`: the checksummed WAL record framing (LogRecord)
//! - `wal`: the append-only log file (Wal)
//! - `recovery`: the analysis / redo / undo pass run at engine open

pub mod record;
pub mod recovery;
pub mod wal;

pub use record::{LogRecord, RecordError, RecordType};
pub use recovery::{RecoveryManager, RecoveryReport};
pub use wal::{Wal, WAL_FILE};
