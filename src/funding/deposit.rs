//! Deposit opening
//!
//! Records the PENDING row a provider webhook later settles. No balance
//! effect until then; the sweeper fails rows that never settle.

use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::info;

use super::error::FundingError;
use crate::core_types::UserId;
use crate::ledger::{self, EntryDraft, Transaction, TransactionStatus, TransactionType, WalletKind};
use crate::store::LedgerStore;

/// Decimal places kept on USDT amounts
pub const USDT_SCALE: u32 = 6;

pub struct DepositService {
    store: Arc<dyn LedgerStore>,
}

impl DepositService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// PENDING DEPOSIT on the user's PIX wallet
    pub async fn open_pix_deposit(
        &self,
        user_id: UserId,
        amount: Decimal,
        provider: &str,
        external_id: &str,
        provider_tx_id: Option<String>,
    ) -> Result<Transaction, FundingError> {
        if amount <= Decimal::ZERO {
            return Err(FundingError::InvalidAmount);
        }
        let mut tx = self.store.begin().await?;
        let wallet_id = tx.wallet_id_for(user_id, WalletKind::Pix).await?;
        let row = ledger::open_pending(
            tx.as_mut(),
            wallet_id,
            EntryDraft::new(TransactionType::Deposit, amount)
                .with_status(TransactionStatus::Pending)
                .with_provider(provider)
                .with_external_id(external_id)
                .with_provider_tx_id(provider_tx_id)
                .with_description("PIX deposit"),
        )
        .await?;
        tx.commit().await?;

        info!(
            transaction_id = row.transaction_id,
            user_id,
            %amount,
            provider,
            external_id,
            "PIX deposit opened"
        );
        Ok(row)
    }

    /// PENDING DEPOSIT on the user's USDT wallet for a BRL-paid purchase
    ///
    /// `quote` is BRL per USDT; the USDT amount is rounded down.
    pub async fn open_usdt_purchase(
        &self,
        user_id: UserId,
        brl_amount: Decimal,
        quote: Decimal,
        provider: &str,
        external_id: &str,
    ) -> Result<Transaction, FundingError> {
        if brl_amount <= Decimal::ZERO {
            return Err(FundingError::InvalidAmount);
        }
        if quote <= Decimal::ZERO {
            return Err(FundingError::InvalidQuote);
        }
        let usdt_amount = usdt_for(brl_amount, quote)?;

        let mut tx = self.store.begin().await?;
        let wallet_id = tx.wallet_id_for(user_id, WalletKind::Usdt).await?;
        let row = ledger::open_pending(
            tx.as_mut(),
            wallet_id,
            EntryDraft::new(TransactionType::Deposit, usdt_amount)
                .with_status(TransactionStatus::Pending)
                .with_provider(provider)
                .with_external_id(external_id)
                .with_description("USDT purchase")
                .with_metadata(serde_json::json!({
                    "brl_amount": brl_amount,
                    "quote": quote,
                })),
        )
        .await?;
        tx.commit().await?;

        info!(
            transaction_id = row.transaction_id,
            user_id,
            %brl_amount,
            %quote,
            %usdt_amount,
            "USDT purchase opened"
        );
        Ok(row)
    }
}

/// USDT bought with `brl_amount` at `quote`, rounded toward zero
pub fn usdt_for(brl_amount: Decimal, quote: Decimal) -> Result<Decimal, FundingError> {
    let usdt = brl_amount
        .checked_div(quote)
        .ok_or(FundingError::InvalidQuote)?
        .round_dp_with_strategy(USDT_SCALE, RoundingStrategy::ToZero);
    if usdt <= Decimal::ZERO {
        return Err(FundingError::InvalidAmount);
    }
    Ok(usdt)
}
