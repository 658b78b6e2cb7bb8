//! Transaction handle.

use brine_core::{Lsn, TxnId};

/// Handle to a running transaction.
///
/// Returned by `TransactionManager::begin` and passed back into every
/// transactional operation. The handle itself is inert: lifecycle state,
/// write set and undo information live in the manager's active table,
/// keyed by id. After `commit` or `rollback` returns, operations through
/// the handle fail with `TransactionNotActive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    id: TxnId,
    start_lsn: Lsn,
}

impl Transaction {
    pub(crate) fn new(id: TxnId, start_lsn: Lsn) -> Self {
        Transaction { id, start_lsn }
    }

    /// Transaction identifier.
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// LSN of this transaction's Begin record.
    pub fn start_lsn(&self) -> Lsn {
        self.start_lsn
    }
}
