//! Core types shared by every BrineDB crate.
//!
//! - `types`: key/value aliases and the identifier types handed out by the
//!   write-ahead log and the transaction manager
//! - `error`: the unified error enum and `Result` alias

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{display_key, Key, Lsn, TxnId, Value};
