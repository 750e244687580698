//! Webhook Normalizer
//!
//! Turns provider-specific JSON into a [`CanonicalWebhookEvent`]. One
//! [`WebhookNormalizer`] per provider, selected through the
//! [`NormalizerRegistry`]. Normalization is pure: no I/O and no clock
//! reads. The caller supplies the receipt time used when a payload carries
//! no timestamp of its own.

pub mod crypto_gateway;
pub mod pix_acquirer;
pub mod pix_bank;
pub mod types;

pub use types::{CanonicalStatus, CanonicalWebhookEvent, EventKind, PayerInfo};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl NormalizeError {
    pub fn code(&self) -> &'static str {
        match self {
            NormalizeError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            NormalizeError::UnknownProvider(_) => "UNKNOWN_PROVIDER",
        }
    }
}

pub(crate) fn malformed(msg: impl Into<String>) -> NormalizeError {
    NormalizeError::MalformedPayload(msg.into())
}

/// Per-provider payload mapping
pub trait WebhookNormalizer: Send + Sync {
    /// Provider id used in the ingress path
    fn provider(&self) -> &'static str;

    fn normalize(
        &self,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<CanonicalWebhookEvent, NormalizeError>;
}

/// Provider id -> normalizer
#[derive(Clone, Default)]
pub struct NormalizerRegistry {
    normalizers: HashMap<&'static str, Arc<dyn WebhookNormalizer>>,
}

impl NormalizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(pix_acquirer::PixAcquirerNormalizer));
        registry.register(Arc::new(pix_bank::PixBankNormalizer));
        registry.register(Arc::new(crypto_gateway::CryptoGatewayNormalizer));
        registry
    }

    pub fn register(&mut self, normalizer: Arc<dyn WebhookNormalizer>) {
        self.normalizers.insert(normalizer.provider(), normalizer);
    }

    pub fn get(&self, provider: &str) -> Option<&Arc<dyn WebhookNormalizer>> {
        self.normalizers.get(provider)
    }

    pub fn providers(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.normalizers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn normalize(
        &self,
        provider: &str,
        payload: &Value,
        received_at: DateTime<Utc>,
    ) -> Result<CanonicalWebhookEvent, NormalizeError> {
        self.get(provider)
            .ok_or_else(|| NormalizeError::UnknownProvider(provider.to_string()))?
            .normalize(payload, received_at)
    }
}

// === Field helpers shared by the provider mappings ===

/// Non-empty string at `key`; numbers are accepted and stringified
pub(crate) fn opt_str(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn req_str(v: &Value, key: &str) -> Result<String, NormalizeError> {
    opt_str(v, key).ok_or_else(|| malformed(format!("missing field '{}'", key)))
}

/// Decimal from a string or JSON number; absent/null is `None`
pub(crate) fn opt_decimal(v: &Value, key: &str) -> Result<Option<Decimal>, NormalizeError> {
    let text = match v.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(malformed(format!("field '{}' is not a number", key))),
    };
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|_| malformed(format!("field '{}' is not a decimal: {}", key, text)))
}

/// Integer minor units (cents) converted to a two-decimal amount
pub(crate) fn opt_cents(v: &Value, key: &str) -> Result<Option<Decimal>, NormalizeError> {
    match v.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|c| Some(Decimal::new(c, 2)))
            .ok_or_else(|| malformed(format!("field '{}' is not integer cents", key))),
        Some(_) => Err(malformed(format!("field '{}' is not integer cents", key))),
    }
}

/// RFC 3339 timestamp; absent falls back to `received_at`
pub(crate) fn timestamp_or(
    v: &Value,
    key: &str,
    received_at: DateTime<Utc>,
) -> Result<DateTime<Utc>, NormalizeError> {
    match opt_str(v, key) {
        None => Ok(received_at),
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| malformed(format!("field '{}' is not an RFC 3339 timestamp", key))),
    }
}

pub(crate) fn unknown_status(provider: &str, status: &str) -> NormalizeError {
    malformed(format!("unknown {} status '{}'", provider, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_defaults() {
        let registry = NormalizerRegistry::with_defaults();
        assert_eq!(
            registry.providers(),
            vec!["crypto-gateway", "pix-acquirer", "pix-bank"]
        );
    }

    #[test]
    fn test_unknown_provider() {
        let registry = NormalizerRegistry::with_defaults();
        let err = registry
            .normalize("carrier-pigeon", &json!({}), Utc::now())
            .unwrap_err();
        assert_eq!(err, NormalizeError::UnknownProvider("carrier-pigeon".into()));
        assert_eq!(err.code(), "UNKNOWN_PROVIDER");
    }

    #[test]
    fn test_decimal_helpers() {
        let v = json!({"a": "10.50", "b": 7.25, "c": null, "d": true, "cents": 12345});
        assert_eq!(opt_decimal(&v, "a").unwrap(), Some(Decimal::new(1050, 2)));
        assert_eq!(opt_decimal(&v, "b").unwrap(), Some(Decimal::new(725, 2)));
        assert_eq!(opt_decimal(&v, "c").unwrap(), None);
        assert_eq!(opt_decimal(&v, "missing").unwrap(), None);
        assert!(opt_decimal(&v, "d").is_err());
        assert_eq!(opt_cents(&v, "cents").unwrap(), Some(Decimal::new(12345, 2)));
    }

    #[test]
    fn test_string_helpers() {
        let v = json!({"id": 42, "blank": "  ", "name": " ana "});
        assert_eq!(opt_str(&v, "id").as_deref(), Some("42"));
        assert_eq!(opt_str(&v, "blank"), None);
        assert_eq!(opt_str(&v, "name").as_deref(), Some("ana"));
        assert!(req_str(&v, "blank").is_err());
    }

    #[test]
    fn test_timestamp_parsing() {
        let received = DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let v = json!({"ts": "yesterday"});
        assert!(timestamp_or(&v, "ts", received).is_err());
        let v = json!({"ts": "2026-03-02T12:00:00-03:00"});
        assert_eq!(
            timestamp_or(&v, "ts", received).unwrap().to_rfc3339(),
            "2026-03-02T15:00:00+00:00"
        );
        assert_eq!(timestamp_or(&json!({}), "ts", received).unwrap(), received);
    }
}
