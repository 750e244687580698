//! Investments
//!
//! USDT-denominated applications, their daily yield accrual, and the
//! apply / liquidate flows.

pub mod accrual;
pub mod error;
pub mod rate;
pub mod service;
pub mod types;

pub use accrual::{AccrualOutcome, AccrualSummary, YieldAccrualEngine};
pub use error::InvestmentError;
pub use rate::{FixedRate, ReferenceRateSource};
pub use service::{InvestmentService, Liquidation};
pub use types::{InvestmentApplication, InvestmentStatus, YieldEntry};

use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YieldAccrualConfig {
    /// Decimal places kept on daily yield (rounded toward zero)
    pub scale: u32,
    /// Daily rate used when a batch request carries none
    pub daily_rate: Decimal,
}

impl Default for YieldAccrualConfig {
    fn default() -> Self {
        Self {
            scale: 6,
            daily_rate: Decimal::new(3, 4),
        }
    }
}
