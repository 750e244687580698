//! Funding Error Types

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum FundingError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Fee must not be negative")]
    InvalidFee,

    #[error("Quote must be greater than zero")]
    InvalidQuote,

    #[error("Invalid payout destination")]
    InvalidDestination,

    #[error("External id already used: {0}")]
    DuplicateExternalId(String),

    /// Synchronous provider rejection; the debit has been refunded
    #[error("Payout failed and refunded: {0}")]
    PayoutRejected(String),

    #[error(transparent)]
    Ledger(LedgerError),

    #[error(transparent)]
    Store(StoreError),
}

impl FundingError {
    pub fn code(&self) -> &'static str {
        match self {
            FundingError::InvalidAmount => "INVALID_AMOUNT",
            FundingError::InvalidFee => "INVALID_FEE",
            FundingError::InvalidQuote => "INVALID_QUOTE",
            FundingError::InvalidDestination => "INVALID_DESTINATION",
            FundingError::DuplicateExternalId(_) => "DUPLICATE_EXTERNAL_ID",
            FundingError::PayoutRejected(_) => "PAYOUT_REJECTED",
            FundingError::Ledger(e) => e.code(),
            FundingError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            FundingError::InvalidAmount
            | FundingError::InvalidFee
            | FundingError::InvalidQuote
            | FundingError::InvalidDestination => 400,
            FundingError::DuplicateExternalId(_) => 409,
            FundingError::Ledger(LedgerError::InsufficientFunds { .. }) => 422,
            FundingError::PayoutRejected(_) => 502,
            FundingError::Ledger(_) | FundingError::Store(_) => 500,
        }
    }
}

impl From<StoreError> for FundingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(what) => FundingError::DuplicateExternalId(what),
            other => FundingError::Store(other),
        }
    }
}

impl From<LedgerError> for FundingError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Store(inner) => FundingError::from(inner),
            other => FundingError::Ledger(other),
        }
    }
}
