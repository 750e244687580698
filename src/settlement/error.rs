//! Settlement Error Types

use thiserror::Error;

use crate::core_types::TransactionId;
use crate::ledger::{LedgerError, TransactionType};
use crate::store::StoreError;
use crate::webhook::EventKind;

#[derive(Error, Debug)]
pub enum SettlementError {
    /// No stored transaction matches any correlation id of the event
    #[error("Transaction not found for event {0}")]
    TransactionNotFound(String),

    #[error("Event kind {kind} does not match transaction {transaction_id} of type {tx_type}")]
    KindMismatch {
        transaction_id: TransactionId,
        tx_type: TransactionType,
        kind: EventKind,
    },

    /// Store conflict persisted after the retry
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error(transparent)]
    Ledger(LedgerError),

    #[error(transparent)]
    Store(StoreError),
}

impl SettlementError {
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            SettlementError::KindMismatch { .. } => "KIND_MISMATCH",
            SettlementError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            SettlementError::Ledger(e) => e.code(),
            SettlementError::Store(_) => "STORE_ERROR",
        }
    }

    #[inline]
    pub fn is_conflict(&self) -> bool {
        match self {
            SettlementError::ConcurrentModification(_) => true,
            SettlementError::Ledger(e) => e.is_conflict(),
            SettlementError::Store(e) => e.is_conflict(),
            _ => false,
        }
    }
}

impl From<StoreError> for SettlementError {
    fn from(e: StoreError) -> Self {
        SettlementError::Store(e)
    }
}

impl From<LedgerError> for SettlementError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Store(inner) => SettlementError::Store(inner),
            other => SettlementError::Ledger(other),
        }
    }
}
