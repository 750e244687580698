//! Canonical webhook event

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of the provider notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    CashIn,
    CashOut,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CashIn => "CASH_IN",
            EventKind::CashOut => "CASH_OUT",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider status vocabularies collapse onto these four
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalStatus {
    Completed,
    Failed,
    Cancelled,
    Processing,
}

impl CanonicalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Completed => "COMPLETED",
            CanonicalStatus::Failed => "FAILED",
            CanonicalStatus::Cancelled => "CANCELLED",
            CanonicalStatus::Processing => "PROCESSING",
        }
    }

    /// FAILED or CANCELLED
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, CanonicalStatus::Failed | CanonicalStatus::Cancelled)
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayerInfo {
    pub name: Option<String>,
    pub document: Option<String>,
    pub bank: Option<String>,
}

impl PayerInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.document.is_none() && self.bank.is_none()
    }
}

/// Provider-independent view of one webhook delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalWebhookEvent {
    pub provider: String,
    /// Our order id when the provider echoes it, else the provider's own id
    pub external_id: String,
    pub end_to_end_id: Option<String>,
    pub provider_tx_id: Option<String>,
    pub kind: EventKind,
    pub status: CanonicalStatus,
    pub amount: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "PayerInfo::is_empty")]
    pub payer: PayerInfo,
    pub raw: serde_json::Value,
}

impl CanonicalWebhookEvent {
    /// Entry appended to the transaction's metadata history
    pub fn history_entry(&self, received_at: DateTime<Utc>) -> serde_json::Value {
        serde_json::json!({
            "provider": self.provider,
            "status": self.status,
            "kind": self.kind,
            "amount": self.amount,
            "event_timestamp": self.timestamp,
            "received_at": received_at,
            "payer": self.payer,
            "payload": self.raw,
        })
    }
}
