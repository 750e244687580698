//! Commission Cycle Engine
//!
//! ```text
//! ACTIVE -> COMPLETED (terminal)
//! ```
//!
//! Earnings are derived from COMPLETED deposits processed inside the cycle
//! window. Recalculation replaces unpaid earnings and never touches a rep
//! whose earning for the cycle has been paid.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

use super::CommissionConfig;
use super::cycle::{period_bounds, window};
use super::error::CommissionError;
use super::types::{
    CommissionCycle, CommissionEarning, CycleStatus, CycleType, NewCommissionEarning,
};
use crate::core_types::{CycleId, EarningId};
use crate::store::{LedgerStore, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaintenanceSummary {
    pub created: Vec<CycleId>,
    pub calculated: usize,
    pub completed: Vec<CycleId>,
    pub failed: usize,
}

pub struct CommissionCycleEngine {
    store: Arc<dyn LedgerStore>,
    config: CommissionConfig,
}

impl CommissionCycleEngine {
    pub fn new(store: Arc<dyn LedgerStore>, config: CommissionConfig) -> Self {
        Self { store, config }
    }

    /// Ensure the cycle of `cycle_type` containing `now` exists
    ///
    /// Returns the cycle and whether this call created it.
    pub async fn create_missing(
        &self,
        cycle_type: CycleType,
        now: DateTime<Utc>,
    ) -> Result<(CommissionCycle, bool), CommissionError> {
        let (start, end) = period_bounds(cycle_type, now.date_naive())?;
        let mut tx = self.store.begin().await?;

        if let Some(existing) = tx.find_cycle(cycle_type, start, end).await? {
            return Ok((existing, false));
        }

        match tx.insert_cycle(cycle_type, start, end, now).await? {
            Some(cycle) => {
                tx.commit().await?;
                info!(
                    cycle_id = cycle.cycle_id,
                    cycle_type = %cycle_type,
                    %start,
                    %end,
                    "Commission cycle created"
                );
                Ok((cycle, true))
            }
            // lost the race against a concurrent creator
            None => {
                let existing = tx.find_cycle(cycle_type, start, end).await?.ok_or_else(|| {
                    StoreError::Corrupt(format!("cycle {} {}..{} vanished", cycle_type, start, end))
                })?;
                Ok((existing, false))
            }
        }
    }

    /// Recompute the unpaid earnings of an ACTIVE cycle
    pub async fn calculate_commissions(
        &self,
        cycle_id: CycleId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CommissionEarning>, CommissionError> {
        let mut tx = self.store.begin().await?;

        let cycle = tx
            .cycle_for_update(cycle_id)
            .await?
            .ok_or(CommissionError::CycleNotFound(cycle_id))?;
        if cycle.status == CycleStatus::Completed {
            return Err(CommissionError::CycleCompleted(cycle_id));
        }

        let (from, to) = window(cycle.start_date, cycle.end_date);
        let volumes = tx
            .settled_volume_by_rep(self.config.volume_wallet, from, to)
            .await?;
        let paid: HashSet<_> = tx.paid_earning_reps(cycle_id).await?.into_iter().collect();
        let replaced = tx.delete_unpaid_earnings(cycle_id).await?;

        let mut earnings = Vec::with_capacity(volumes.len());
        for volume in volumes {
            if paid.contains(&volume.sales_rep_id) {
                continue;
            }
            let rule = volume.rule.unwrap_or(self.config.default_rule);
            let earning = tx
                .insert_earning(&NewCommissionEarning {
                    cycle_id,
                    sales_rep_id: volume.sales_rep_id,
                    amount: rule.apply(volume.volume, volume.transaction_count),
                    base_volume: volume.volume,
                    transaction_count: volume.transaction_count,
                    created_at: now,
                })
                .await?;
            earnings.push(earning);
        }
        tx.commit().await?;

        info!(
            cycle_id,
            earnings = earnings.len(),
            replaced,
            skipped_paid = paid.len(),
            "Commissions calculated"
        );
        Ok(earnings)
    }

    pub async fn complete_cycle(
        &self,
        cycle_id: CycleId,
        now: DateTime<Utc>,
    ) -> Result<CommissionCycle, CommissionError> {
        let mut tx = self.store.begin().await?;
        let mut cycle = tx
            .cycle_for_update(cycle_id)
            .await?
            .ok_or(CommissionError::CycleNotFound(cycle_id))?;
        if cycle.status != CycleStatus::Active {
            return Err(CommissionError::CycleCompleted(cycle_id));
        }

        cycle.status = CycleStatus::Completed;
        cycle.completed_at = Some(now);
        tx.update_cycle(&cycle).await?;
        tx.commit().await?;

        info!(cycle_id, "Commission cycle completed");
        Ok(cycle)
    }

    pub async fn mark_period_earning_as_paid(
        &self,
        earning_id: EarningId,
        payment_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<CommissionEarning, CommissionError> {
        let payment_reference = payment_reference.trim();
        if payment_reference.is_empty() {
            return Err(CommissionError::InvalidReference);
        }

        let mut tx = self.store.begin().await?;
        let mut earning = tx
            .earning_for_update(earning_id)
            .await?
            .ok_or(CommissionError::EarningNotFound(earning_id))?;
        if earning.paid {
            return Err(CommissionError::EarningAlreadyPaid(earning_id));
        }

        earning.paid = true;
        earning.paid_at = Some(now);
        earning.payment_reference = Some(payment_reference.to_string());
        tx.update_earning(&earning).await?;
        tx.commit().await?;

        info!(earning_id, payment_reference, "Commission earning paid");
        Ok(earning)
    }

    /// Batch entry point: open current cycles, then settle every ACTIVE
    /// cycle whose period has ended
    pub async fn run_maintenance(
        &self,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceSummary, CommissionError> {
        let mut summary = MaintenanceSummary::default();

        for cycle_type in [CycleType::Weekly, CycleType::Monthly] {
            let (cycle, created) = self.create_missing(cycle_type, now).await?;
            if created {
                summary.created.push(cycle.cycle_id);
            }
        }

        let active = {
            let mut tx = self.store.begin().await?;
            tx.active_cycles().await?
        };

        let today = now.date_naive();
        for cycle in active.into_iter().filter(|c| c.end_date <= today) {
            let result = match self.calculate_commissions(cycle.cycle_id, now).await {
                Ok(_) => {
                    summary.calculated += 1;
                    self.complete_cycle(cycle.cycle_id, now).await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(done) => summary.completed.push(done.cycle_id),
                Err(e) => {
                    summary.failed += 1;
                    error!(cycle_id = cycle.cycle_id, error = %e, "Cycle maintenance failed");
                }
            }
        }

        info!(
            created = summary.created.len(),
            calculated = summary.calculated,
            completed = summary.completed.len(),
            failed = summary.failed,
            "Commission maintenance finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::types::CommissionRule;
    use crate::ledger::{self, EntryDraft, LedgerRef, TransactionType, WalletKind};
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap()
    }

    async fn settled_deposit(store: &MemoryStore, user_id: i64, amount: &str) {
        let mut tx = store.begin().await.unwrap();
        let wallet = tx.wallet_id_for(user_id, WalletKind::Pix).await.unwrap();
        let mut row = ledger::credit(
            tx.as_mut(),
            wallet,
            d(amount),
            LedgerRef::Record(EntryDraft::new(TransactionType::Deposit, d(amount))),
        )
        .await
        .unwrap();
        // pin processing time inside the test week
        row.processed_at = Some(wednesday());
        tx.update_transaction(&row).await.unwrap();
        tx.commit().await.unwrap();
    }

    async fn setup() -> (MemoryStore, CommissionCycleEngine) {
        let store = MemoryStore::new();
        store.assign_sales_rep(1, 900).await;
        store.assign_sales_rep(2, 900).await;
        store.assign_sales_rep(3, 901).await;
        store
            .set_commission_rule(901, CommissionRule::Fixed(d("5.00")))
            .await;
        settled_deposit(&store, 1, "1000.00").await;
        settled_deposit(&store, 2, "500.00").await;
        settled_deposit(&store, 3, "80.00").await;
        // no rep: ignored
        settled_deposit(&store, 4, "999.00").await;

        let engine = CommissionCycleEngine::new(Arc::new(store.clone()), CommissionConfig::default());
        (store, engine)
    }

    #[tokio::test]
    async fn test_create_missing_once() {
        let (_, engine) = setup().await;
        let (first, created) = engine
            .create_missing(CycleType::Weekly, wednesday())
            .await
            .unwrap();
        assert!(created);
        let (second, created) = engine
            .create_missing(CycleType::Weekly, wednesday())
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.cycle_id, second.cycle_id);
    }

    #[tokio::test]
    async fn test_calculate_is_repeatable() {
        let (_, engine) = setup().await;
        let (cycle, _) = engine
            .create_missing(CycleType::Weekly, wednesday())
            .await
            .unwrap();

        let first = engine
            .calculate_commissions(cycle.cycle_id, wednesday())
            .await
            .unwrap();
        let second = engine
            .calculate_commissions(cycle.cycle_id, wednesday())
            .await
            .unwrap();

        let amounts = |e: &[CommissionEarning]| {
            e.iter()
                .map(|x| (x.sales_rep_id, x.amount, x.transaction_count))
                .collect::<Vec<_>>()
        };
        assert_eq!(amounts(&first), amounts(&second));
        // rep 900: 1% of 1500; rep 901: 5.00 x 1
        assert_eq!(
            amounts(&second),
            vec![(900, d("15.00"), 2), (901, d("5.00"), 1)]
        );
    }

    #[tokio::test]
    async fn test_paid_earnings_survive_recalculation() {
        let (store, engine) = setup().await;
        let (cycle, _) = engine
            .create_missing(CycleType::Weekly, wednesday())
            .await
            .unwrap();
        let earnings = engine
            .calculate_commissions(cycle.cycle_id, wednesday())
            .await
            .unwrap();
        let paid = engine
            .mark_period_earning_as_paid(earnings[0].earning_id, "PIX-REF-1", wednesday())
            .await
            .unwrap();

        let again = engine
            .mark_period_earning_as_paid(paid.earning_id, "PIX-REF-2", wednesday())
            .await
            .unwrap_err();
        assert_eq!(again.code(), "EARNING_ALREADY_PAID");

        engine
            .calculate_commissions(cycle.cycle_id, wednesday())
            .await
            .unwrap();
        let state = store.snapshot().await;
        let for_cycle: Vec<_> = state
            .earnings
            .values()
            .filter(|e| e.cycle_id == cycle.cycle_id)
            .collect();
        assert_eq!(for_cycle.len(), 2);
        assert!(state.earnings[&paid.earning_id].paid);
    }

    #[tokio::test]
    async fn test_completed_cycle_rejects_changes() {
        let (_, engine) = setup().await;
        let (cycle, _) = engine
            .create_missing(CycleType::Monthly, wednesday())
            .await
            .unwrap();
        engine.complete_cycle(cycle.cycle_id, wednesday()).await.unwrap();

        let err = engine
            .calculate_commissions(cycle.cycle_id, wednesday())
            .await
            .unwrap_err();
        assert!(matches!(err, CommissionError::CycleCompleted(_)));
        let err = engine
            .complete_cycle(cycle.cycle_id, wednesday())
            .await
            .unwrap_err();
        assert!(matches!(err, CommissionError::CycleCompleted(_)));
    }

    #[tokio::test]
    async fn test_maintenance_closes_elapsed_cycles() {
        let (_, engine) = setup().await;
        let first = engine.run_maintenance(wednesday()).await.unwrap();
        assert_eq!(first.created.len(), 2);
        assert!(first.completed.is_empty());

        // following Tuesday: the weekly cycle has ended, the monthly has not
        let later = Utc.with_ymd_and_hms(2026, 3, 10, 1, 0, 0).unwrap();
        let second = engine.run_maintenance(later).await.unwrap();
        assert_eq!(second.created.len(), 1);
        assert_eq!(second.completed, vec![first.created[0]]);
        assert_eq!(second.failed, 0);
    }
}
