//! USDT purchase gateway IPN callbacks
//!
//! ```json
//! {
//!   "payment_id": 5077125051,
//!   "order_id": "usdt-2026-0042",
//!   "payment_status": "finished",
//!   "price_amount": 550.0,
//!   "price_currency": "brl",
//!   "pay_amount": "100.00",
//!   "actually_paid": "100.00",
//!   "pay_currency": "usdttrc20",
//!   "updated_at": "2026-03-02T15:00:00Z"
//! }
//! ```
//!
//! Purchases only, so every event is a cash-in. The amount compared against
//! the pending row is the USDT actually paid.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{
    CanonicalStatus, CanonicalWebhookEvent, EventKind, NormalizeError, PayerInfo,
    WebhookNormalizer, malformed, opt_decimal, opt_str, req_str, timestamp_or,
    unknown_status,
};

pub const PROVIDER_ID: &str = "crypto-gateway";

pub struct CryptoGatewayNormalizer;

fn map_status(status: &str) -> Result<CanonicalStatus, NormalizeError> {
    match status.to_lowercase().as_str() {
        "finished" => Ok(CanonicalStatus::Completed),
        "failed" => Ok(CanonicalStatus::Failed),
        "expired" | "refunded" => Ok(CanonicalStatus::Cancelled),
        "waiting" | "confirming" | "confirmed" | "sending" | "partially_paid" => {
            Ok(CanonicalStatus::Processing)
        }
        other => Err(unknown_status(PROVIDER_ID, other)),
    }
}

impl WebhookNormalizer for CryptoGatewayNormalizer {
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

        let order_id = req_str(payload, "order_id")?;
        let status = map_status(&req_str(payload, "payment_status")?)?;

        let amount = match opt_decimal(payload, "actually_paid")? {
            Some(paid) if !paid.is_zero() => Some(paid),
            _ => opt_decimal(payload, "pay_amount")?,
        };

        Ok(CanonicalWebhookEvent {
            provider: PROVIDER_ID.to_string(),
            external_id: order_id,
            end_to_end_id: None,
            provider_tx_id: opt_str(payload, "payment_id"),
            kind: EventKind::CashIn,
            status,
            amount,
            timestamp: timestamp_or(payload, "updated_at", received_at)?,
            payer: PayerInfo::default(),
            raw: payload.clone(),
        })
    }
}
