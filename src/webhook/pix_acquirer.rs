//! PIX acquirer callbacks
//!
//! ```json
//! {
//!   "transactionId": "pa_8f2c",
//!   "externalId": "dep-2026-0001",
//!   "endToEndId": "E1234567820260302150000000000001",
//!   "type": "CASH_IN",
//!   "status": "PAID",
//!   "amount": "100.00",
//!   "createdAt": "2026-03-02T15:00:00Z",
//!   "payer": { "name": "Ana", "document": "***.456.789-**", "bank": "001" }
//! }
//! ```
//!
//! `amountInCents` may replace `amount`. `externalId` is optional; the
//! acquirer's own id stands in when it is missing.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{
    CanonicalStatus, CanonicalWebhookEvent, EventKind, NormalizeError, PayerInfo,
    WebhookNormalizer, malformed, opt_cents, opt_decimal, opt_str, req_str, timestamp_or,
    unknown_status,
};

pub const PROVIDER_ID: &str = "pix-acquirer";

pub struct PixAcquirerNormalizer;

fn map_status(status: &str) -> Result<CanonicalStatus, NormalizeError> {
    match status.to_uppercase().as_str() {
        "PAID" | "COMPLETED" | "CONFIRMED" | "SETTLED" => Ok(CanonicalStatus::Completed),
        "FAILED" | "ERROR" | "REJECTED" => Ok(CanonicalStatus::Failed),
        "CANCELED" | "CANCELLED" | "EXPIRED" | "REVERSED" => Ok(CanonicalStatus::Cancelled),
        "PENDING" | "PROCESSING" | "IN_PROCESS" | "CREATED" => Ok(CanonicalStatus::Processing),
        other => Err(unknown_status(PROVIDER_ID, other)),
    }
}

fn map_kind(kind: &str) -> Result<EventKind, NormalizeError> {
    match kind.to_uppercase().as_str() {
        "CASH_IN" | "PIX_IN" | "DEPOSIT" => Ok(EventKind::CashIn),
        "CASH_OUT" | "PIX_OUT" | "WITHDRAW" | "WITHDRAWAL" => Ok(EventKind::CashOut),
        other => Err(malformed(format!("unknown {} type '{}'", PROVIDER_ID, other))),
    }
}

impl WebhookNormalizer for PixAcquirerNormalizer {
    fn provider(&self) -> &'static str {
        PROVIDER_ID
    }

    fn normalize(
        &self,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<CanonicalWebhookEvent, NormalizeError> {
        if !payload.is_object() {
            return Err(malformed("payload is not a JSON object"));
        }

        let provider_tx_id = req_str(payload, "transactionId")?;
        let status = map_status(&req_str(payload, "status")?)?;
        let kind = map_kind(&req_str(payload, "type")?)?;

        let amount = match opt_decimal(payload, "amount")? {
            Some(a) => Some(a),
            None => opt_cents(payload, "amountInCents")?,
        };

        let payer = payload
            .get("payer")
            .map(|p| PayerInfo {
                name: opt_str(p, "name"),
                document: opt_str(p, "document"),
                bank: opt_str(p, "bank"),
            })
            .unwrap_or_default();

        Ok(CanonicalWebhookEvent {
            provider: PROVIDER_ID.to_string(),
            external_id: opt_str(payload, "externalId").unwrap_or_else(|| provider_tx_id.clone()),
            end_to_end_id: opt_str(payload, "endToEndId"),
            provider_tx_id: Some(provider_tx_id),
            kind,
            status,
            amount,
            timestamp: timestamp_or(payload, "createdAt", received_at)?,
            payer,
            raw: payload.clone(),
        })
    }
}
