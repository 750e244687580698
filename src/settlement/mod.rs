//! Settlement
//!
//! Canonical webhook events in, exactly-once ledger mutations out.

pub mod error;
pub mod processor;

pub use error::SettlementError;
pub use processor::SettlementProcessor;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::TransactionId;
use crate::ledger::TransactionStatus;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// How far back the providerTxId fallback lookup reaches
    pub lookup_window_hours: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            lookup_window_hours: 72,
        }
    }
}

/// What an accepted event did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Cash-in completed and credited
    Credited {
        transaction_id: TransactionId,
        balance_after: Decimal,
    },
    /// Cash-out failed; `amount + fee` returned through a REFUND entry
    Refunded {
        transaction_id: TransactionId,
        refund_id: TransactionId,
    },
    /// Status and metadata only
    StatusUpdated {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },
    /// Duplicate delivery for a COMPLETED row
    AlreadySettled { transaction_id: TransactionId },
    /// Event for a FAILED/EXPIRED row, kept for manual reconciliation
    LateEvent {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },
}

impl SettlementOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementOutcome::Credited { .. } => "credited",
            SettlementOutcome::Refunded { .. } => "refunded",
            SettlementOutcome::StatusUpdated { .. } => "status_updated",
            SettlementOutcome::AlreadySettled { .. } => "already_settled",
            SettlementOutcome::LateEvent { .. } => "late_event",
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        match self {
            SettlementOutcome::Credited { transaction_id, .. }
            | SettlementOutcome::Refunded { transaction_id, .. }
            | SettlementOutcome::StatusUpdated { transaction_id, .. }
            | SettlementOutcome::AlreadySettled { transaction_id }
            | SettlementOutcome::LateEvent { transaction_id, .. } => *transaction_id,
        }
    }
}
