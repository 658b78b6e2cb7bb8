//! Error types for BrineDB.
//!
//! A single `Error` enum is used across all crates, with `thiserror` for the
//! `Display` and `Error` implementations. Lower layers define small local
//! error enums where a caller needs to distinguish failure shapes (for
//! example a torn WAL record versus a short read) and convert upward via
//! `#[from]`.
//!
//! Classification:
//!
//! - `Io`: any underlying file-system failure (open, read, write, fsync,
//!   rename). Surfaced to the caller unchanged; no retries.
//! - `Corruption`: a checksum mismatch or malformed framing. During
//!   recovery this is treated as end-of-log, not as fatal.
//! - `TransactionNotActive`: an operation on a committed or rolled-back
//!   transaction handle.
//! - `InvalidOperation`: a state-machine violation that is a caller bug.

use std::io;
use thiserror::Error;

/// Result type alias used throughout BrineDB.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all BrineDB operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure in the store file, the WAL, or the network front-end.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Checksum mismatch or malformed on-disk framing.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// The engine was asked to do work after `close`, or before `open`
    /// finished.
    #[error("engine is not open")]
    NotOpen,

    /// An operation was attempted on a transaction that has already been
    /// committed or rolled back.
    #[error("transaction {txn_id} is not active")]
    TransactionNotActive {
        /// Identifier of the offending transaction.
        txn_id: u64,
    },

    /// Operation not valid in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Build a `Corruption` error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Error::Corruption(message.into())
    }

    /// Build an `InvalidOperation` error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation(message.into())
    }

    /// True for errors that indicate damaged on-disk state.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }
}
