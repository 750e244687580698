//! Sales-rep commissions
//!
//! Periodic aggregation of settled deposit volume into per-rep earnings.

pub mod cycle;
pub mod engine;
pub mod error;
pub mod types;

pub use engine::{CommissionCycleEngine, MaintenanceSummary};
pub use error::CommissionError;
pub use types::{CommissionCycle, CommissionEarning, CommissionRule, CycleStatus, CycleType};

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::ledger::WalletKind;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommissionConfig {
    /// Applied to reps without their own rule
    pub default_rule: CommissionRule,
    /// Wallet kind whose completed deposits count as volume
    pub volume_wallet: WalletKind,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            default_rule: CommissionRule::Percentage(Decimal::new(1, 2)),
            volume_wallet: WalletKind::Pix,
        }
    }
}
