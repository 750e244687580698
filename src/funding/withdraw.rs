use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::FundingError;
use super::payout_client::PayoutClient;
use crate::core_types::{TransactionId, UserId};
use crate::ledger::{self, EntryDraft, LedgerRef, TransactionStatus, TransactionType, WalletKind};
use crate::settlement::processor::fail_withdrawal;
use crate::store::LedgerStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutReceipt {
    pub transaction_id: TransactionId,
    pub external_id: String,
    pub provider_tx_id: String,
    pub status: TransactionStatus,
}

pub struct WithdrawService {
    store: Arc<dyn LedgerStore>,
}

impl WithdrawService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Request a payout
    /// 1. Debit `amount + fee`, record PROCESSING WITHDRAWAL (one unit)
    /// 2. Submit to the payout rail
    /// 3. On acceptance store the provider id; the webhook finishes it
    ///    On rejection mark FAILED and refund in one unit
    pub async fn request_payout(
        &self,
        client: &dyn PayoutClient,
        user_id: UserId,
        kind: WalletKind,
        amount: Decimal,
        fee: Decimal,
        destination: &str,
    ) -> Result<PayoutReceipt, FundingError> {
        if amount <= Decimal::ZERO {
            return Err(FundingError::InvalidAmount);
        }
        if fee < Decimal::ZERO {
            return Err(FundingError::InvalidFee);
        }
        if !client.validate_destination(destination) {
            return Err(FundingError::InvalidDestination);
        }

        let external_id = format!("wd-{}", Uuid::new_v4().simple());
        let row = {
            let mut tx = self.store.begin().await?;
            let wallet_id = tx.wallet_id_for(user_id, kind).await?;
            let row = ledger::debit(
                tx.as_mut(),
                wallet_id,
                amount + fee,
                LedgerRef::Record(
                    EntryDraft::new(TransactionType::Withdrawal, amount)
                        .with_fee(fee)
                        .with_status(TransactionStatus::Processing)
                        .with_provider(client.provider())
                        .with_external_id(external_id.clone())
                        .with_description(format!("Payout to {}", destination))
                        .with_metadata(serde_json::json!({ "destination": destination })),
                ),
            )
            .await?;
            tx.commit().await?;
            row
        };

        match client.submit_payout(&external_id, destination, amount).await {
            Ok(provider_tx_id) => {
                let mut tx = self.store.begin().await?;
                let status = match tx.transaction_for_update(row.transaction_id).await? {
                    Some(mut current) => {
                        // a fast webhook may have settled it already
                        if current.provider_tx_id.is_none() {
                            current.provider_tx_id = Some(provider_tx_id.clone());
                            tx.update_transaction(&current).await?;
                            tx.commit().await?;
                        }
                        current.status
                    }
                    None => row.status,
                };

                info!(
                    transaction_id = row.transaction_id,
                    user_id,
                    %amount,
                    %fee,
                    provider_tx_id = %provider_tx_id,
                    "Payout submitted"
                );
                Ok(PayoutReceipt {
                    transaction_id: row.transaction_id,
                    external_id,
                    provider_tx_id,
                    status,
                })
            }
            Err(e) => {
                warn!(
                    transaction_id = row.transaction_id,
                    error = %e,
                    "Payout submission failed, refunding"
                );
                let mut tx = self.store.begin().await?;
                if let Some(current) = tx.transaction_for_update(row.transaction_id).await?
                    && !current.status.is_terminal()
                {
                    fail_withdrawal(
                        tx.as_mut(),
                        current,
                        &format!("submit_failed: {}", e),
                        Utc::now(),
                    )
                    .await?;
                    tx.commit().await?;
                }
                Err(FundingError::PayoutRejected(e.to_string()))
            }
        }
    }
}
