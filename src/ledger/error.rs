//! Ledger Error Types

use rust_decimal::Decimal;
use thiserror::Error;

use crate::core_types::{TransactionId, WalletId};
use crate::ledger::types::TransactionStatus;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Wallet not found: {0}")]
    WalletNotFound(WalletId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Transaction {0} already terminal ({1})")]
    AlreadyTerminal(TransactionId, TransactionStatus),

    /// The settled row belongs to another wallet, or the posting amount does
    /// not match the row
    #[error("Ledger reference mismatch: {0}")]
    ReferenceMismatch(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            LedgerError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            LedgerError::AlreadyTerminal(..) => "ALREADY_TERMINAL",
            LedgerError::ReferenceMismatch(_) => "REFERENCE_MISMATCH",
            LedgerError::Store(e) if e.is_conflict() => "CONCURRENT_MODIFICATION",
            LedgerError::Store(_) => "STORE_ERROR",
        }
    }

    /// Serialization failure or deadlock underneath; safe to retry the unit
    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Store(e) if e.is_conflict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::InvalidAmount.code(), "INVALID_AMOUNT");
        let err = LedgerError::InsufficientFunds {
            balance: Decimal::from(5),
            requested: Decimal::from(10),
        };
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(
            err.to_string(),
            "Insufficient funds: balance 5, requested 10"
        );
    }

    #[test]
    fn test_conflict_passthrough() {
        let err = LedgerError::from(StoreError::Conflict("40001".into()));
        assert!(err.is_conflict());
        assert_eq!(err.code(), "CONCURRENT_MODIFICATION");
        assert!(!LedgerError::from(StoreError::Database("x".into())).is_conflict());
    }
}
