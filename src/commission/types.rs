//! Commission cycle and earning types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core_types::{CycleId, EarningId, SalesRepId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleType {
    /// Monday through Sunday
    Weekly,
    /// Calendar month
    Monthly,
}

impl CycleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleType::Weekly => "WEEKLY",
            CycleType::Monthly => "MONTHLY",
        }
    }
}

impl fmt::Display for CycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CycleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "WEEKLY" => Ok(CycleType::Weekly),
            "MONTHLY" => Ok(CycleType::Monthly),
            _ => Err(format!("Invalid cycle type: {}", s)),
        }
    }
}

/// ACTIVE -> COMPLETED (terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    Active,
    Completed,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Active => "ACTIVE",
            CycleStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(CycleStatus::Active),
            "COMPLETED" => Ok(CycleStatus::Completed),
            _ => Err(format!("Invalid cycle status: {}", s)),
        }
    }
}

/// Commission cycle covering `[start_date, end_date)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionCycle {
    pub cycle_id: CycleId,
    pub cycle_type: CycleType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CycleStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// How a sales rep's commission is derived from settled volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum CommissionRule {
    /// Fraction of settled volume (0.01 = 1%)
    Percentage(Decimal),
    /// Flat amount per qualifying settled transaction
    Fixed(Decimal),
}

impl CommissionRule {
    /// Commission for the given volume, rounded to cents
    pub fn apply(&self, volume: Decimal, transaction_count: i64) -> Decimal {
        let raw = match self {
            CommissionRule::Percentage(rate) => volume * rate,
            CommissionRule::Fixed(per_tx) => per_tx * Decimal::from(transaction_count),
        };
        raw.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::ToZero)
    }
}

/// Settled volume attributed to one sales rep inside a window
#[derive(Debug, Clone, PartialEq)]
pub struct RepVolume {
    pub sales_rep_id: SalesRepId,
    pub volume: Decimal,
    pub transaction_count: i64,
    /// Per-rep override; `None` falls back to the configured default
    pub rule: Option<CommissionRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionEarning {
    pub earning_id: EarningId,
    pub cycle_id: CycleId,
    pub sales_rep_id: SalesRepId,
    pub amount: Decimal,
    pub base_volume: Decimal,
    pub transaction_count: i64,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCommissionEarning {
    pub cycle_id: CycleId,
    pub sales_rep_id: SalesRepId,
    pub amount: Decimal,
    pub base_volume: Decimal,
    pub transaction_count: i64,
    pub created_at: DateTime<Utc>,
}
