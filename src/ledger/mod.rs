// Ledger module - THE BALANCES
// Aggregate and per-version balances, append-only records, atomic commit

mod aggregate;
mod commit;
mod records;
mod versioned;

use crate::storage::StoreError;
use sled::transaction::TransactionError;
use thiserror::Error;

pub use aggregate::{AggregateBalance, AggregateKey, AggregateLedger};
pub use commit::{commit, CommitSet, CommitSummary};
pub use records::{ActivityDirection, ActivityEntry, CorrelationId, PayRecord, UnreadFlag};
pub use versioned::{DeltaGuard, SpendableRows, VersionedBalance, VersionedDelta, VersionedKey, VersionedLedger};

/// Errors from ledger reads and commits
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Versioned balance {key} would become negative ({amount})")]
    NegativeBalance { key: String, amount: i64 },

    #[error("Balance {0} would overflow")]
    Overflow(String),

    #[error("Versioned balance {0} is recorded against a different backing version")]
    DigestMismatch(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<TransactionError<LedgerError>> for LedgerError {
    fn from(err: TransactionError<LedgerError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => LedgerError::Store(e.into()),
        }
    }
}
