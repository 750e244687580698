//! Investment application and yield entry types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core_types::{InvestmentId, PlanId, UserId};

/// Investment application lifecycle
///
/// ```text
/// PENDING -> ACTIVE -> LIQUIDATED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestmentStatus {
    Pending,
    Active,
    Liquidated,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Pending => "PENDING",
            InvestmentStatus::Active => "ACTIVE",
            InvestmentStatus::Liquidated => "LIQUIDATED",
        }
    }
}

impl fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvestmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(InvestmentStatus::Pending),
            "ACTIVE" => Ok(InvestmentStatus::Active),
            "LIQUIDATED" => Ok(InvestmentStatus::Liquidated),
            _ => Err(format!("Invalid investment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentApplication {
    pub investment_id: InvestmentId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub principal_amount: Decimal,
    pub current_value: Decimal,
    pub accumulated_yield: Decimal,
    pub status: InvestmentStatus,
    pub maturity_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub liquidated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewInvestment {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub principal_amount: Decimal,
    pub status: InvestmentStatus,
    pub maturity_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// One accrual per (investment, reference date). Zero-amount entries mark
/// days where the rate floor applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldEntry {
    pub yield_id: i64,
    pub investment_id: InvestmentId,
    pub base_amount: Decimal,
    pub yield_rate: Decimal,
    pub yield_amount: Decimal,
    pub reference_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewYieldEntry {
    pub investment_id: InvestmentId,
    pub base_amount: Decimal,
    pub yield_rate: Decimal,
    pub yield_amount: Decimal,
    pub reference_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}
