//! Investment Error Types

use rust_decimal::Decimal;
use thiserror::Error;

use crate::core_types::InvestmentId;
use crate::investment::types::InvestmentStatus;
use crate::ledger::LedgerError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum InvestmentError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Investment not found: {0}")]
    InvestmentNotFound(InvestmentId),

    #[error("Investment {0} is not active ({1})")]
    InvestmentNotActive(InvestmentId, InvestmentStatus),

    #[error("Reference rate unavailable: {0}")]
    RateUnavailable(String),

    #[error("Daily yield overflows: base {base}, rate {rate}")]
    YieldOverflow { base: Decimal, rate: Decimal },

    #[error(transparent)]
    Ledger(LedgerError),

    #[error(transparent)]
    Store(StoreError),
}

impl InvestmentError {
    pub fn code(&self) -> &'static str {
        match self {
            InvestmentError::InvalidAmount => "INVALID_AMOUNT",
            InvestmentError::InvestmentNotFound(_) => "INVESTMENT_NOT_FOUND",
            InvestmentError::InvestmentNotActive(..) => "INVESTMENT_NOT_ACTIVE",
            InvestmentError::RateUnavailable(_) => "RATE_UNAVAILABLE",
            InvestmentError::YieldOverflow { .. } => "YIELD_OVERFLOW",
            InvestmentError::Ledger(e) => e.code(),
            InvestmentError::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<StoreError> for InvestmentError {
    fn from(e: StoreError) -> Self {
        InvestmentError::Store(e)
    }
}

impl From<LedgerError> for InvestmentError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Store(inner) => InvestmentError::Store(inner),
            other => InvestmentError::Ledger(other),
        }
    }
}
