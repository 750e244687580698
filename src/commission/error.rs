//! Commission Error Types

use thiserror::Error;

use crate::core_types::{CycleId, EarningId};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CommissionError {
    #[error("Commission cycle not found: {0}")]
    CycleNotFound(CycleId),

    #[error("Commission cycle {0} is already completed")]
    CycleCompleted(CycleId),

    #[error("Commission earning not found: {0}")]
    EarningNotFound(EarningId),

    #[error("Commission earning {0} is already paid")]
    EarningAlreadyPaid(EarningId),

    #[error("Payment reference must not be empty")]
    InvalidReference,

    #[error("Cannot compute cycle period: {0}")]
    InvalidPeriod(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommissionError {
    pub fn code(&self) -> &'static str {
        match self {
            CommissionError::CycleNotFound(_) => "CYCLE_NOT_FOUND",
            CommissionError::CycleCompleted(_) => "CYCLE_COMPLETED",
            CommissionError::EarningNotFound(_) => "EARNING_NOT_FOUND",
            CommissionError::EarningAlreadyPaid(_) => "EARNING_ALREADY_PAID",
            CommissionError::InvalidReference => "INVALID_REFERENCE",
            CommissionError::InvalidPeriod(_) => "INVALID_PERIOD",
            CommissionError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            CommissionError::CycleNotFound(_) | CommissionError::EarningNotFound(_) => 404,
            CommissionError::CycleCompleted(_) | CommissionError::EarningAlreadyPaid(_) => 409,
            CommissionError::InvalidReference => 400,
            CommissionError::InvalidPeriod(_) | CommissionError::Store(_) => 500,
        }
    }
}
