use crate::identity::HolderId;
use crate::ledger::LedgerError;
use crate::lock::LockError;
use crate::skills::SkillError;
use crate::snapshot::SnapshotError;
use crate::storage::StoreError;
use thiserror::Error;

/// Why a transfer did not settle.
///
/// Every kind except the last two is a rejection: the request was refused
/// before anything was written, and `code()` is stable for callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Payer and receiver are the same holder")]
    SelfTransferRejected,

    #[error("Receiver {0} is not a registered holder")]
    UnknownReceiver(HolderId),

    #[error("Coin {0} does not exist")]
    UnknownCoin(HolderId),

    #[error("Amount {0} is out of range")]
    InvalidAmount(u64),

    #[error("Holder {0} is busy with another operation")]
    ConcurrentOperationInProgress(HolderId),

    #[error("Holder {0} has no active skills to back an issuance")]
    NoActiveSkillsForIssuance(HolderId),

    #[error("{holder} holds {available} of coin {coin}, {requested} requested")]
    InsufficientBalance {
        holder: HolderId,
        coin: HolderId,
        requested: u64,
        available: i64,
    },

    #[error("Internal consistency violation: {0}")]
    InternalConsistencyViolation(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl TransferError {
    /// Stable code reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::SelfTransferRejected => "self_transfer_rejected",
            TransferError::UnknownReceiver(_) => "unknown_receiver",
            TransferError::UnknownCoin(_) => "unknown_coin",
            TransferError::InvalidAmount(_) => "invalid_amount",
            TransferError::ConcurrentOperationInProgress(_) => "concurrent_operation_in_progress",
            TransferError::NoActiveSkillsForIssuance(_) => "no_active_skills_for_issuance",
            TransferError::InsufficientBalance { .. } => "insufficient_balance",
            TransferError::InternalConsistencyViolation(_) => "internal_error",
            TransferError::PersistenceFailure(_) => "persistence_failure",
        }
    }

    /// Whether this is a user-facing rejection rather than a server failure
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            TransferError::InternalConsistencyViolation(_) | TransferError::PersistenceFailure(_)
        )
    }
}

impl From<StoreError> for TransferError {
    fn from(err: StoreError) -> Self {
        TransferError::PersistenceFailure(err.to_string())
    }
}

impl From<LockError> for TransferError {
    fn from(err: LockError) -> Self {
        TransferError::ConcurrentOperationInProgress(err.holder().clone())
    }
}

impl From<LedgerError> for TransferError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Store(e) => e.into(),
            // A planned delta that the ledger refuses means the plan was wrong
            other => TransferError::InternalConsistencyViolation(other.to_string()),
        }
    }
}

impl From<SnapshotError> for TransferError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Store(e) => e.into(),
            other => TransferError::InternalConsistencyViolation(other.to_string()),
        }
    }
}

impl From<SkillError> for TransferError {
    fn from(err: SkillError) -> Self {
        match err {
            SkillError::Busy(e) => e.into(),
            other => TransferError::PersistenceFailure(other.to_string()),
        }
    }
}
