//! Yield Accrual Engine
//!
//! Daily batch pass over ACTIVE investments. Each investment is its own
//! unit of work; the (investment, reference date) uniqueness of yield
//! entries makes a re-run for the same date a no-op.
//!
//! Lock order per investment: investment row, USDT wallet row, then the
//! INVESTMENT wallet row.

use chrono::{NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::YieldAccrualConfig;
use super::error::InvestmentError;
use super::rate::ReferenceRateSource;
use super::types::{InvestmentStatus, NewYieldEntry};
use crate::core_types::InvestmentId;
use crate::ledger::{self, EntryDraft, LedgerRef, TransactionType, WalletKind};
use crate::store::LedgerStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccrualOutcome {
    Credited(Decimal),
    /// Rate floor or rounding left nothing to pay; a zero entry was written
    ZeroYield,
    AlreadyAccrued,
    NotActive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccrualSummary {
    pub reference_date: Option<NaiveDate>,
    pub reference_rate: Decimal,
    pub effective_rate: Decimal,
    pub processed: usize,
    pub credited: usize,
    pub zero_yield: usize,
    pub already_accrued: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_yield: Decimal,
}

pub struct YieldAccrualEngine {
    store: Arc<dyn LedgerStore>,
    rates: Arc<dyn ReferenceRateSource>,
    config: YieldAccrualConfig,
}

impl YieldAccrualEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rates: Arc<dyn ReferenceRateSource>,
        config: YieldAccrualConfig,
    ) -> Self {
        Self {
            store,
            rates,
            config,
        }
    }

    /// Accrue one day. `rate_override` replaces the configured rate source.
    pub async fn run(
        &self,
        reference_date: NaiveDate,
        rate_override: Option<Decimal>,
    ) -> Result<AccrualSummary, InvestmentError> {
        let reference_rate = match rate_override {
            Some(rate) => rate,
            None => self.rates.daily_rate(reference_date).await?,
        };
        let effective_rate = reference_rate.max(Decimal::ZERO);

        let ids = {
            let mut tx = self.store.begin().await?;
            tx.active_investment_ids().await?
        };

        let mut summary = AccrualSummary {
            reference_date: Some(reference_date),
            reference_rate,
            effective_rate,
            ..Default::default()
        };

        for investment_id in ids {
            summary.processed += 1;
            match self
                .accrue_one(investment_id, reference_date, reference_rate, effective_rate)
                .await
            {
                Ok(AccrualOutcome::Credited(amount)) => {
                    summary.credited += 1;
                    summary.total_yield += amount;
                }
                Ok(AccrualOutcome::ZeroYield) => summary.zero_yield += 1,
                Ok(AccrualOutcome::AlreadyAccrued) => summary.already_accrued += 1,
                Ok(AccrualOutcome::NotActive) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(investment_id, error = %e, "Yield accrual failed");
                }
            }
        }

        info!(
            %reference_date,
            %reference_rate,
            processed = summary.processed,
            credited = summary.credited,
            zero_yield = summary.zero_yield,
            already_accrued = summary.already_accrued,
            failed = summary.failed,
            total_yield = %summary.total_yield,
            "Yield accrual finished"
        );
        Ok(summary)
    }

    /// Yield for one day, rounded toward zero so it never over-credits
    pub fn daily_yield(
        &self,
        current_value: Decimal,
        effective_rate: Decimal,
    ) -> Result<Decimal, InvestmentError> {
        let raw = current_value
            .checked_mul(effective_rate)
            .ok_or(InvestmentError::YieldOverflow {
                base: current_value,
                rate: effective_rate,
            })?;
        Ok(raw.round_dp_with_strategy(self.config.scale, RoundingStrategy::ToZero))
    }

    async fn accrue_one(
        &self,
        investment_id: InvestmentId,
        reference_date: NaiveDate,
        reference_rate: Decimal,
        effective_rate: Decimal,
    ) -> Result<AccrualOutcome, InvestmentError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let mut investment = tx
            .investment_for_update(investment_id)
            .await?
            .ok_or(InvestmentError::InvestmentNotFound(investment_id))?;
        if investment.status != InvestmentStatus::Active {
            return Ok(AccrualOutcome::NotActive);
        }

        let amount = self.daily_yield(investment.current_value, effective_rate)?;
        let inserted = tx
            .insert_yield_entry(&NewYieldEntry {
                investment_id,
                base_amount: investment.current_value,
                yield_rate: reference_rate,
                yield_amount: amount,
                reference_date,
                created_at: now,
            })
            .await?;
        if !inserted {
            debug!(investment_id, %reference_date, "Yield already accrued");
            return Ok(AccrualOutcome::AlreadyAccrued);
        }

        if amount.is_zero() {
            tx.commit().await?;
            return Ok(AccrualOutcome::ZeroYield);
        }

        let entry = EntryDraft::new(TransactionType::Return, amount)
            .with_description(format!("Daily yield {}", reference_date))
            .with_metadata(serde_json::json!({
                "investment_id": investment_id,
                "reference_date": reference_date,
                "base_amount": investment.current_value,
                "rate": reference_rate,
            }));

        let usdt_wallet = tx.wallet_id_for(investment.user_id, WalletKind::Usdt).await?;
        ledger::credit(
            tx.as_mut(),
            usdt_wallet,
            amount,
            LedgerRef::Record(
                entry
                    .clone()
                    .with_external_id(format!("yield:{}:{}", investment_id, reference_date)),
            ),
        )
        .await?;

        // externalId stays on the USDT leg only; it is unique
        let aggregate = tx
            .wallet_id_for(investment.user_id, WalletKind::Investment)
            .await?;
        ledger::credit(tx.as_mut(), aggregate, amount, LedgerRef::Record(entry)).await?;

        investment.current_value += amount;
        investment.accumulated_yield += amount;
        tx.update_investment(&investment).await?;

        tx.commit().await?;
        Ok(AccrualOutcome::Credited(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investment::rate::FixedRate;
    use crate::investment::service::InvestmentService;
    use crate::store::MemoryStore;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    async fn funded_investment(store: &MemoryStore, principal: &str) -> InvestmentId {
        let mut tx = store.begin().await.unwrap();
        let usdt = tx.wallet_id_for(1, WalletKind::Usdt).await.unwrap();
        ledger::credit(
            tx.as_mut(),
            usdt,
            d(principal),
            LedgerRef::Record(EntryDraft::new(TransactionType::Deposit, d(principal))),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let service = InvestmentService::new(Arc::new(store.clone()));
        service
            .apply(1, 10, d(principal), None)
            .await
            .unwrap()
            .investment_id
    }

    fn engine(store: &MemoryStore, rate: &str) -> YieldAccrualEngine {
        YieldAccrualEngine::new(
            Arc::new(store.clone()),
            Arc::new(FixedRate(d(rate))),
            YieldAccrualConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_positive_rate_credits_usdt_and_value() {
        let store = MemoryStore::new();
        let id = funded_investment(&store, "1000.00").await;

        let summary = engine(&store, "0.0003").run(day(), None).await.unwrap();
        assert_eq!(summary.credited, 1);
        assert_eq!(summary.total_yield, d("0.3"));

        let state = store.snapshot().await;
        let inv = &state.investments[&id];
        assert_eq!(inv.current_value, d("1000.30"));
        assert_eq!(inv.accumulated_yield, d("0.30"));
        assert_eq!(state.wallet_of(1, WalletKind::Usdt).unwrap().balance, d("0.30"));
        assert_eq!(
            state.wallet_of(1, WalletKind::Investment).unwrap().balance,
            d("1000.30")
        );
    }

    #[tokio::test]
    async fn test_negative_rate_writes_zero_entry() {
        let store = MemoryStore::new();
        let id = funded_investment(&store, "1000.00").await;

        let summary = engine(&store, "0.0003")
            .run(day(), Some(d("-0.001")))
            .await
            .unwrap();
        assert_eq!(summary.zero_yield, 1);
        assert_eq!(summary.effective_rate, Decimal::ZERO);

        let state = store.snapshot().await;
        assert_eq!(state.investments[&id].current_value, d("1000.00"));
        assert_eq!(state.yield_entries.len(), 1);
        assert_eq!(state.yield_entries[0].yield_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_same_day_rerun_is_noop() {
        let store = MemoryStore::new();
        funded_investment(&store, "500.00").await;
        let engine = engine(&store, "0.001");

        engine.run(day(), None).await.unwrap();
        let second = engine.run(day(), None).await.unwrap();
        assert_eq!(second.already_accrued, 1);
        assert_eq!(second.credited, 0);

        let state = store.snapshot().await;
        assert_eq!(state.yield_entries.len(), 1);
        assert_eq!(state.wallet_of(1, WalletKind::Usdt).unwrap().balance, d("0.5"));
    }

    #[tokio::test]
    async fn test_yield_posts_entry_on_investment_wallet() {
        let store = MemoryStore::new();
        let id = funded_investment(&store, "1000.00").await;
        engine(&store, "0.0003").run(day(), None).await.unwrap();

        let state = store.snapshot().await;
        let aggregate = state.wallet_of(1, WalletKind::Investment).unwrap();
        let yield_rows: Vec<_> = state
            .transactions_of_wallet(aggregate.wallet_id)
            .into_iter()
            .filter(|t| t.tx_type == TransactionType::Return)
            .collect();
        assert_eq!(yield_rows.len(), 1);
        assert_eq!(yield_rows[0].amount, d("0.3"));
        assert_eq!(yield_rows[0].balance_after, Some(d("1000.30")));
        assert!(yield_rows[0].external_id.is_none());

        let usdt = state.wallet_of(1, WalletKind::Usdt).unwrap();
        let usdt_leg = state
            .transactions_of_wallet(usdt.wallet_id)
            .into_iter()
            .find(|t| t.tx_type == TransactionType::Return)
            .unwrap();
        assert_eq!(
            usdt_leg.external_id.as_deref(),
            Some(format!("yield:{}:{}", id, day()).as_str())
        );
        assert!(usdt_leg.transaction_id < yield_rows[0].transaction_id);
    }

    #[tokio::test]
    async fn test_one_failed_investment_does_not_stop_batch() {
        let store = MemoryStore::new();
        let first = funded_investment(&store, "1000.00").await;
        let second = funded_investment(&store, "2000.00").await;

        // the first investment's commit is rejected
        store.inject_conflicts(1);
        let summary = engine(&store, "0.001").run(day(), None).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.credited, 1);
        assert_eq!(summary.total_yield, d("2"));

        let state = store.snapshot().await;
        assert_eq!(state.investments[&first].current_value, d("1000.00"));
        assert_eq!(state.investments[&second].current_value, d("2002.000"));
        assert_eq!(state.yield_entries.len(), 1);
        assert_eq!(state.yield_entries[0].investment_id, second);

        // the next run for the same date picks up the one that failed
        let retry = engine(&store, "0.001").run(day(), None).await.unwrap();
        assert_eq!(retry.credited, 1);
        assert_eq!(retry.already_accrued, 1);
        let state = store.snapshot().await;
        assert_eq!(state.investments[&first].current_value, d("1001.000"));
    }

    #[test]
    fn test_rounding_toward_zero() {
        let store = MemoryStore::new();
        let engine = engine(&store, "0");
        // 333.333333 * 0.0001 = 0.0333333333 -> 0.033333 at scale 6
        assert_eq!(
            engine.daily_yield(d("333.333333"), d("0.0001")).unwrap(),
            d("0.033333")
        );
    }

    #[test]
    fn test_yield_overflow_is_an_error() {
        let store = MemoryStore::new();
        let engine = engine(&store, "0");
        let err = engine
            .daily_yield(Decimal::MAX, Decimal::from(2))
            .unwrap_err();
        assert_eq!(err.code(), "YIELD_OVERFLOW");
    }
}
