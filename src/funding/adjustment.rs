use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use super::error::FundingError;
use crate::core_types::UserId;
use crate::ledger::{self, Transaction, WalletKind};
use crate::store::LedgerStore;

/// Operator corrections. The only path allowed to take a wallet negative.
pub struct AdjustmentService {
    store: Arc<dyn LedgerStore>,
}

impl AdjustmentService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn adjust(
        &self,
        user_id: UserId,
        kind: WalletKind,
        signed_amount: Decimal,
        reason: &str,
        actor: &str,
    ) -> Result<Transaction, FundingError> {
        if signed_amount.is_zero() {
            return Err(FundingError::InvalidAmount);
        }
        let mut tx = self.store.begin().await?;
        let wallet_id = tx.wallet_id_for(user_id, kind).await?;
        let row = ledger::adjust(tx.as_mut(), wallet_id, signed_amount, reason, actor).await?;
        tx.commit().await?;

        info!(
            transaction_id = row.transaction_id,
            user_id,
            wallet = %kind,
            amount = %signed_amount,
            actor,
            "Wallet adjusted"
        );
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_negative_adjustment_may_overdraw() {
        let store = MemoryStore::new();
        let service = AdjustmentService::new(Arc::new(store.clone()));

        let row = service
            .adjust(3, WalletKind::Pix, Decimal::new(-1250, 2), "chargeback", "ops@paygate")
            .await
            .unwrap();
        assert_eq!(row.balance_after, Some(Decimal::new(-1250, 2)));

        let state = store.snapshot().await;
        assert_eq!(
            state.wallet_of(3, WalletKind::Pix).unwrap().balance,
            Decimal::new(-1250, 2)
        );
        assert_eq!(state.audit_for(row.transaction_id, "adjustment").len(), 1);
    }

    #[tokio::test]
    async fn test_zero_adjustment_rejected() {
        let service = AdjustmentService::new(Arc::new(MemoryStore::new()));
        let err = service
            .adjust(3, WalletKind::Usdt, Decimal::ZERO, "noop", "ops")
            .await
            .unwrap_err();
        assert!(matches!(err, FundingError::InvalidAmount));
    }
}
