//! Concurrency control for BrineDB.
//!
//! - `lock`: per-key shared/exclusive locks with condition-variable waiting
//! - `transaction`: the transaction handle and its lifecycle states
//! - `manager`: transaction lifecycle, WAL ordering, strict 2PL release

pub mod lock;
pub mod manager;
pub mod transaction;

pub use lock::{LockManager, LockMode};
pub use manager::{ActiveTxn, TransactionManager};
pub use transaction::Transaction;
