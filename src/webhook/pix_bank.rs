//! PIX bank partner notifications
//!
//! Envelope with the charge under `data`, in the bank's Portuguese
//! vocabulary:
//!
//! ```json
//! {
//!   "event": "pix.received",
//!   "data": {
//!     "txid": "dep-2026-0001",
//!     "id": "bk-77812",
//!     "endToEndId": "E0000000020260302150000000000009",
//!     "status": "CONCLUIDA",
//!     "valor": "100.00",
//!     "horario": "2026-03-02T12:00:00-03:00",
//!     "pagador": { "nome": "Ana", "cpf": "12345678900", "banco": "Banco X" }
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{
    CanonicalStatus, CanonicalWebhookEvent, EventKind, NormalizeError, PayerInfo,
    WebhookNormalizer, malformed, opt_decimal, opt_str, req_str, timestamp_or,
    unknown_status,
};

pub const PROVIDER_ID: &str = "pix-bank";

pub struct PixBankNormalizer;

fn map_status(status: &str) -> Result<CanonicalStatus, NormalizeError> {
    match status.to_uppercase().as_str() {
        "CONCLUIDA" | "REALIZADA" | "LIQUIDADA" => Ok(CanonicalStatus::Completed),
        "NAO_REALIZADA" | "FALHA" | "DEVOLVIDA" => Ok(CanonicalStatus::Failed),
        "REMOVIDA_PELO_USUARIO_RECEBEDOR" | "REMOVIDA_PELO_PSP" | "CANCELADA" => {
            Ok(CanonicalStatus::Cancelled)
        }
        "ATIVA" | "EM_PROCESSAMENTO" => Ok(CanonicalStatus::Processing),
        other => Err(unknown_status(PROVIDER_ID, other)),
    }
}

fn map_event(event: &str) -> Result<EventKind, NormalizeError> {
    match event {
        "pix.received" | "cob.paid" | "pix.charge" => Ok(EventKind::CashIn),
        "pix.sent" | "pix.payout" => Ok(EventKind::CashOut),
        other => Err(malformed(format!("unknown {} event '{}'", PROVIDER_ID, other))),
    }
}

impl WebhookNormalizer for PixBankNormalizer {
    fn provider(&self) -> &'static str {
        PROVIDER_ID
    }

    fn normalize(
        &self,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<CanonicalWebhookEvent, NormalizeError> {
        let kind = map_event(&req_str(payload, "event")?)?;
        let data = payload
            .get("data")
            .filter(|d| d.is_object())
            .ok_or_else(|| malformed("missing object 'data'"))?;

        let txid = req_str(data, "txid")?;
        let status = map_status(&req_str(data, "status")?)?;

        let payer = data
            .get("pagador")
            .map(|p| PayerInfo {
                name: opt_str(p, "nome"),
                document: opt_str(p, "cpf").or_else(|| opt_str(p, "cnpj")),
                bank: opt_str(p, "banco"),
            })
            .unwrap_or_default();

        Ok(CanonicalWebhookEvent {
            provider: PROVIDER_ID.to_string(),
            external_id: txid,
            end_to_end_id: opt_str(data, "endToEndId"),
            provider_tx_id: opt_str(data, "id"),
            kind,
            status,
            amount: opt_decimal(data, "valor")?,
            timestamp: timestamp_or(data, "horario", received_at)?,
            payer,
            raw: payload.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn test_concluded_charge() {
        let payload = json!({
            "event": "pix.received",
            "data": {
                "txid": "dep-9",
                "id": "bk-1",
                "endToEndId": "E9",
                "status": "CONCLUIDA",
                "valor": "100.00",
                "horario": "2026-03-02T12:00:00-03:00",
                "pagador": {"nome": "Ana", "cnpj": "00111222000133", "banco": "Banco X"}
            }
        });
        let event = PixBankNormalizer.normalize(&payload, Utc::now()).unwrap();
        assert_eq!(event.external_id, "dep-9");
        assert_eq!(event.provider_tx_id.as_deref(), Some("bk-1"));
        assert_eq!(event.kind, EventKind::CashIn);
        assert_eq!(event.status, CanonicalStatus::Completed);
        assert_eq!(event.amount, Some(Decimal::new(10000, 2)));
        assert_eq!(event.payer.document.as_deref(), Some("00111222000133"));
    }

    #[test]
    fn test_missing_horario_uses_receipt_time() {
        let payload = json!({
            "event": "pix.sent",
            "data": {"txid": "wd-3", "status": "REALIZADA"}
        });
        let received = DateTime::parse_from_rfc3339("2026-03-02T15:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let event = PixBankNormalizer.normalize(&payload, received).unwrap();
        assert_eq!(event.timestamp, received);
        assert_eq!(event.kind, EventKind::CashOut);
    }

    #[test]
    fn test_status_vocabulary() {
        for (raw, expected) in [
            ("REALIZADA", CanonicalStatus::Completed),
            ("NAO_REALIZADA", CanonicalStatus::Failed),
            ("REMOVIDA_PELO_PSP", CanonicalStatus::Cancelled),
            ("ATIVA", CanonicalStatus::Processing),
        ] {
            assert_eq!(map_status(raw).unwrap(), expected, "{}", raw);
        }
        assert!(map_status("DESCONHECIDA").is_err());
    }

    #[test]
    fn test_missing_envelope_parts() {
        let no_data = json!({"event": "pix.sent"});
        assert!(PixBankNormalizer.normalize(&no_data, Utc::now()).is_err());

        let no_txid = json!({"event": "pix.sent", "data": {"status": "REALIZADA"}});
        assert!(PixBankNormalizer.normalize(&no_txid, Utc::now()).is_err());

        let bad_event = json!({"event": "pix.maybe", "data": {"txid": "a", "status": "ATIVA"}});
        assert!(PixBankNormalizer.normalize(&bad_event, Utc::now()).is_err());
    }
}
