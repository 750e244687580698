//! Reference rate source
//!
//! Market-data fetching lives outside this crate; the accrual engine only
//! needs "the daily rate for this date".

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::InvestmentError;

#[async_trait]
pub trait ReferenceRateSource: Send + Sync {
    /// Daily reference rate (0.0003 = 0.03% per day). May be negative.
    async fn daily_rate(&self, date: NaiveDate) -> Result<Decimal, InvestmentError>;
}

/// Rate fixed by configuration
#[derive(Debug, Clone, Copy)]
pub struct FixedRate(pub Decimal);

#[async_trait]
impl ReferenceRateSource for FixedRate {
    async fn daily_rate(&self, _date: NaiveDate) -> Result<Decimal, InvestmentError> {
        Ok(self.0)
    }
}
