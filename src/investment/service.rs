//! Investment apply / liquidate
//!
//! Moves funds between a user's USDT wallet and the INVESTMENT aggregate
//! wallet, one ledger entry on each side. Same lock order as accrual:
//! investment row, USDT wallet, INVESTMENT wallet.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::error::InvestmentError;
use super::types::{InvestmentApplication, InvestmentStatus, NewInvestment};
use crate::core_types::{InvestmentId, PlanId, TransactionId, UserId};
use crate::ledger::{self, EntryDraft, LedgerRef, TransactionType, WalletKind};
use crate::store::LedgerStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Liquidation {
    pub investment_id: InvestmentId,
    /// Principal returned to the USDT wallet
    pub paid_out: Decimal,
    pub transaction_id: Option<TransactionId>,
}

pub struct InvestmentService {
    store: Arc<dyn LedgerStore>,
}

impl InvestmentService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Debit the USDT wallet and open an ACTIVE application
    pub async fn apply(
        &self,
        user_id: UserId,
        plan_id: PlanId,
        amount: Decimal,
        maturity_date: Option<NaiveDate>,
    ) -> Result<InvestmentApplication, InvestmentError> {
        if amount <= Decimal::ZERO {
            return Err(InvestmentError::InvalidAmount);
        }
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let investment = tx
            .insert_investment(&NewInvestment {
                user_id,
                plan_id,
                principal_amount: amount,
                status: InvestmentStatus::Active,
                maturity_date,
                created_at: now,
            })
            .await?;

        let entry = EntryDraft::new(TransactionType::Investment, amount)
            .with_description(format!("Investment in plan {}", plan_id))
            .with_metadata(serde_json::json!({
                "investment_id": investment.investment_id,
                "plan_id": plan_id,
            }));

        let usdt_wallet = tx.wallet_id_for(user_id, WalletKind::Usdt).await?;
        ledger::debit(
            tx.as_mut(),
            usdt_wallet,
            amount,
            LedgerRef::Record(entry.clone()),
        )
        .await?;

        let aggregate = tx.wallet_id_for(user_id, WalletKind::Investment).await?;
        ledger::credit(tx.as_mut(), aggregate, amount, LedgerRef::Record(entry)).await?;
        tx.commit().await?;

        info!(
            investment_id = investment.investment_id,
            user_id,
            plan_id,
            %amount,
            "Investment applied"
        );
        Ok(investment)
    }

    /// Close an ACTIVE application
    ///
    /// Daily yield has already been paid to the USDT wallet, so only the
    /// principal (`current_value - accumulated_yield`) goes back.
    pub async fn liquidate(
        &self,
        investment_id: InvestmentId,
    ) -> Result<Liquidation, InvestmentError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let mut investment = tx
            .investment_for_update(investment_id)
            .await?
            .ok_or(InvestmentError::InvestmentNotFound(investment_id))?;
        if investment.status != InvestmentStatus::Active {
            return Err(InvestmentError::InvestmentNotActive(
                investment_id,
                investment.status,
            ));
        }

        let paid_out = investment.current_value - investment.accumulated_yield;
        let transaction_id = if paid_out > Decimal::ZERO {
            let usdt_wallet = tx
                .wallet_id_for(investment.user_id, WalletKind::Usdt)
                .await?;
            let row = ledger::credit(
                tx.as_mut(),
                usdt_wallet,
                paid_out,
                LedgerRef::Record(
                    EntryDraft::new(TransactionType::Return, paid_out)
                        .with_description(format!("Liquidation of investment {}", investment_id))
                        .with_metadata(serde_json::json!({
                            "investment_id": investment_id,
                            "liquidation": true,
                        })),
                ),
            )
            .await?;
            Some(row.transaction_id)
        } else {
            None
        };

        let aggregate = tx
            .wallet_id_for(investment.user_id, WalletKind::Investment)
            .await?;
        ledger::debit(
            tx.as_mut(),
            aggregate,
            investment.current_value,
            LedgerRef::Record(
                EntryDraft::new(TransactionType::Return, investment.current_value)
                    .with_description(format!("Liquidation of investment {}", investment_id))
                    .with_metadata(serde_json::json!({
                        "investment_id": investment_id,
                        "principal": paid_out,
                        "accumulated_yield": investment.accumulated_yield,
                    })),
            ),
        )
        .await?;

        investment.status = InvestmentStatus::Liquidated;
        investment.liquidated_at = Some(now);
        tx.update_investment(&investment).await?;
        tx.commit().await?;

        info!(investment_id, %paid_out, "Investment liquidated");
        Ok(Liquidation {
            investment_id,
            paid_out,
            transaction_id,
        })
    }
}
