//! Outbound payout rail
//!
//! The provider call that moves money out after the ledger debit. Its
//! final result arrives later as a webhook; a synchronous rejection is
//! refunded immediately.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("Provider unreachable: {0}")]
    Network(String),
    #[error("Payout rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait PayoutClient: Send + Sync + Debug {
    /// Provider id recorded on the withdrawal row
    fn provider(&self) -> &'static str;

    /// Format check for the destination (PIX key, wallet address)
    fn validate_destination(&self, destination: &str) -> bool;

    /// Submit the payout; returns the provider's transaction id
    async fn submit_payout(
        &self,
        external_id: &str,
        destination: &str,
        amount: Decimal,
    ) -> Result<String, PayoutError>;
}

/// PIX payout simulator
///
/// Accepts any PIX key shape (email, phone, CPF/CNPJ digits, random key)
/// and answers with a generated provider id. `fail_submit` makes every
/// submission fail.
#[derive(Debug, Default)]
pub struct MockPixPayout {
    pub fail_submit: AtomicBool,
    pub submit_count: AtomicUsize,
}

impl MockPixPayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let client = Self::default();
        client.fail_submit.store(true, Ordering::SeqCst);
        client
    }

    pub fn submissions(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PayoutClient for MockPixPayout {
    fn provider(&self) -> &'static str {
        "pix-acquirer"
    }

    fn validate_destination(&self, destination: &str) -> bool {
        let key = destination.trim();
        if key.is_empty() || key.len() > 77 {
            return false;
        }
        let digits = key.chars().filter(|c| c.is_ascii_digit()).count();
        key.contains('@')
            || (key.starts_with('+') && digits >= 10)
            || (digits == key.len() && (digits == 11 || digits == 14))
            || (key.len() == 36 && key.chars().filter(|c| *c == '-').count() == 4)
    }

    async fn submit_payout(
        &self,
        _external_id: &str,
        _destination: &str,
        _amount: Decimal,
    ) -> Result<String, PayoutError> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(PayoutError::Rejected("simulated provider rejection".to_string()));
        }
        Ok(format!("po_{}", uuid::Uuid::new_v4().simple()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pix_key_shapes() {
        let client = MockPixPayout::new();
        assert!(client.validate_destination("ana@example.com"));
        assert!(client.validate_destination("+5511999998888"));
        assert!(client.validate_destination("12345678900"));
        assert!(client.validate_destination("00111222000133"));
        assert!(client.validate_destination("123e4567-e89b-12d3-a456-426614174000"));

        assert!(!client.validate_destination(""));
        assert!(!client.validate_destination("12345"));
        assert!(!client.validate_destination("not a key"));
    }

    #[tokio::test]
    async fn test_failing_mock_counts_submissions() {
        let client = MockPixPayout::failing();
        assert!(client.submit_payout("wd-1", "a@b.c", Decimal::ONE).await.is_err());
        assert_eq!(client.submissions(), 1);
    }
}
