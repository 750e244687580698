//! In-memory ledger store
//!
//! Same atomic semantics as PostgreSQL with the coarsest possible lock: a
//! unit of work holds the whole state behind one async mutex and stages its
//! writes on a copy that replaces the state on commit. Used by standalone
//! runs and by the test suite.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LedgerStore, StoreError, StoreResult, StoreTx};
use crate::commission::types::{
    CommissionCycle, CommissionEarning, CommissionRule, CycleStatus, CycleType,
    NewCommissionEarning, RepVolume,
};
use crate::core_types::{
    CycleId, EarningId, InvestmentId, SalesRepId, TransactionId, UserId, WalletId,
};
use crate::investment::types::{
    InvestmentApplication, InvestmentStatus, NewInvestment, NewYieldEntry, YieldEntry,
};
use crate::ledger::types::{
    AuditEntry, NewAuditEntry, NewTransaction, Transaction, TransactionStatus, TransactionType,
    Wallet, WalletKind,
};

/// Full store contents
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub wallets: BTreeMap<WalletId, Wallet>,
    pub transactions: BTreeMap<TransactionId, Transaction>,
    pub audit: Vec<AuditEntry>,
    pub investments: BTreeMap<InvestmentId, InvestmentApplication>,
    pub yield_entries: Vec<YieldEntry>,
    pub cycles: BTreeMap<CycleId, CommissionCycle>,
    pub earnings: BTreeMap<EarningId, CommissionEarning>,
    /// Depositor -> sales rep attribution
    pub sales_reps: HashMap<UserId, SalesRepId>,
    pub rep_rules: HashMap<SalesRepId, CommissionRule>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn wallet_of(&self, user_id: UserId, kind: WalletKind) -> Option<&Wallet> {
        self.wallets
            .values()
            .find(|w| w.user_id == user_id && w.kind == kind)
    }

    pub fn transactions_of_wallet(&self, wallet_id: WalletId) -> Vec<&Transaction> {
        self.transactions
            .values()
            .filter(|t| t.wallet_id == wallet_id)
            .collect()
    }

    pub fn audit_for(&self, entity_id: i64, action: &str) -> Vec<&AuditEntry> {
        self.audit
            .iter()
            .filter(|a| a.entity_id == entity_id && a.action == action)
            .collect()
    }
}

/// In-memory [`LedgerStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    /// Number of upcoming commits that fail with `Conflict`
    injected_conflicts: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Attribute a depositor to a sales rep
    pub async fn assign_sales_rep(&self, user_id: UserId, sales_rep_id: SalesRepId) {
        self.state.lock().await.sales_reps.insert(user_id, sales_rep_id);
    }

    pub async fn set_commission_rule(&self, sales_rep_id: SalesRepId, rule: CommissionRule) {
        self.state.lock().await.rep_rules.insert(sales_rep_id, rule);
    }

    /// Make the next `n` commits fail as if the backend detected a
    /// serialization conflict
    pub fn inject_conflicts(&self, n: usize) {
        self.injected_conflicts.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            staged,
            injected_conflicts: self.injected_conflicts.clone(),
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    injected_conflicts: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn wallet_id_for(&mut self, user_id: UserId, kind: WalletKind) -> StoreResult<WalletId> {
        if let Some(w) = self.staged.wallet_of(user_id, kind) {
            return Ok(w.wallet_id);
        }
        let wallet_id = self.staged.next_id();
        let now = Utc::now();
        self.staged.wallets.insert(
            wallet_id,
            Wallet {
                wallet_id,
                user_id,
                kind,
                balance: Decimal::ZERO,
                frozen_balance: Decimal::ZERO,
                total_deposited: Decimal::ZERO,
                total_withdrawn: Decimal::ZERO,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(wallet_id)
    }

    async fn wallet_for_update(&mut self, wallet_id: WalletId) -> StoreResult<Option<Wallet>> {
        Ok(self.staged.wallets.get(&wallet_id).cloned())
    }

    async fn update_wallet(&mut self, wallet: &Wallet) -> StoreResult<()> {
        let row = self
            .staged
            .wallets
            .get_mut(&wallet.wallet_id)
            .ok_or_else(|| StoreError::Corrupt(format!("wallet {} vanished", wallet.wallet_id)))?;
        row.balance = wallet.balance;
        row.frozen_balance = wallet.frozen_balance;
        row.total_deposited = wallet.total_deposited;
        row.total_withdrawn = wallet.total_withdrawn;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_transaction(&mut self, new: &NewTransaction) -> StoreResult<Transaction> {
        if let Some(ref ext) = new.external_id
            && self
                .staged
                .transactions
                .values()
                .any(|t| t.external_id.as_deref() == Some(ext.as_str()))
        {
            return Err(StoreError::Duplicate(format!("external_id {}", ext)));
        }

        let transaction_id = self.staged.next_id();
        let tx = Transaction {
            transaction_id,
            wallet_id: new.wallet_id,
            user_id: new.user_id,
            tx_type: new.tx_type,
            status: new.status,
            amount: new.amount,
            fee: new.fee,
            provider: new.provider.clone(),
            external_id: new.external_id.clone(),
            end_to_end_id: new.end_to_end_id.clone(),
            provider_tx_id: new.provider_tx_id.clone(),
            balance_after: new.balance_after,
            failure_reason: None,
            description: new.description.clone(),
            metadata: new.metadata.clone(),
            created_at: new.created_at,
            updated_at: new.created_at,
            processed_at: new.processed_at,
        };
        self.staged.transactions.insert(transaction_id, tx.clone());
        Ok(tx)
    }

    async fn transaction_for_update(
        &mut self,
        transaction_id: TransactionId,
    ) -> StoreResult<Option<Transaction>> {
        Ok(self.staged.transactions.get(&transaction_id).cloned())
    }

    async fn find_by_external_id_for_update(
        &mut self,
        external_id: &str,
    ) -> StoreResult<Option<Transaction>> {
        Ok(self
            .staged
            .transactions
            .values()
            .find(|t| t.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn find_by_end_to_end_id_for_update(
        &mut self,
        end_to_end_id: &str,
    ) -> StoreResult<Option<Transaction>> {
        Ok(self
            .staged
            .transactions
            .values()
            .find(|t| t.end_to_end_id.as_deref() == Some(end_to_end_id))
            .cloned())
    }

    async fn find_open_by_provider_tx_id_for_update(
        &mut self,
        provider_tx_id: &str,
        created_since: DateTime<Utc>,
    ) -> StoreResult<Option<Transaction>> {
        Ok(self
            .staged
            .transactions
            .values()
            .rev()
            .find(|t| {
                t.provider_tx_id.as_deref() == Some(provider_tx_id)
                    && !t.status.is_terminal()
                    && t.created_at >= created_since
            })
            .cloned())
    }

    async fn update_transaction(&mut self, tx: &Transaction) -> StoreResult<()> {
        let row = self
            .staged
            .transactions
            .get_mut(&tx.transaction_id)
            .ok_or_else(|| {
                StoreError::Corrupt(format!("transaction {} vanished", tx.transaction_id))
            })?;
        row.status = tx.status;
        row.end_to_end_id = tx.end_to_end_id.clone();
        row.provider_tx_id = tx.provider_tx_id.clone();
        row.balance_after = tx.balance_after;
        row.failure_reason = tx.failure_reason.clone();
        row.metadata = tx.metadata.clone();
        row.processed_at = tx.processed_at;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn stale_pending_deposits(
        &mut self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .staged
            .transactions
            .values()
            .filter(|t| {
                t.tx_type == TransactionType::Deposit
                    && t.status == TransactionStatus::Pending
                    && t.created_at < created_before
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.created_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert_audit(&mut self, entry: &NewAuditEntry) -> StoreResult<()> {
        let audit_id = self.staged.next_id();
        self.staged.audit.push(AuditEntry {
            audit_id,
            entity: entry.entity.to_string(),
            entity_id: entry.entity_id,
            action: entry.action.to_string(),
            actor: entry.actor.clone(),
            user_id: entry.user_id,
            details: entry.details.clone(),
            created_at: entry.created_at,
        });
        Ok(())
    }

    async fn insert_investment(&mut self, new: &NewInvestment) -> StoreResult<InvestmentApplication> {
        let investment_id = self.staged.next_id();
        let inv = InvestmentApplication {
            investment_id,
            user_id: new.user_id,
            plan_id: new.plan_id,
            principal_amount: new.principal_amount,
            current_value: new.principal_amount,
            accumulated_yield: Decimal::ZERO,
            status: new.status,
            maturity_date: new.maturity_date,
            created_at: new.created_at,
            updated_at: new.created_at,
            liquidated_at: None,
        };
        self.staged.investments.insert(investment_id, inv.clone());
        Ok(inv)
    }

    async fn active_investment_ids(&mut self) -> StoreResult<Vec<InvestmentId>> {
        Ok(self
            .staged
            .investments
            .values()
            .filter(|i| i.status == InvestmentStatus::Active)
            .map(|i| i.investment_id)
            .collect())
    }

    async fn investment_for_update(
        &mut self,
        investment_id: InvestmentId,
    ) -> StoreResult<Option<InvestmentApplication>> {
        Ok(self.staged.investments.get(&investment_id).cloned())
    }

    async fn update_investment(&mut self, investment: &InvestmentApplication) -> StoreResult<()> {
        let row = self
            .staged
            .investments
            .get_mut(&investment.investment_id)
            .ok_or_else(|| {
                StoreError::Corrupt(format!("investment {} vanished", investment.investment_id))
            })?;
        row.current_value = investment.current_value;
        row.accumulated_yield = investment.accumulated_yield;
        row.status = investment.status;
        row.liquidated_at = investment.liquidated_at;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_yield_entry(&mut self, entry: &NewYieldEntry) -> StoreResult<bool> {
        if self.staged.yield_entries.iter().any(|y| {
            y.investment_id == entry.investment_id && y.reference_date == entry.reference_date
        }) {
            return Ok(false);
        }
        let yield_id = self.staged.next_id();
        self.staged.yield_entries.push(YieldEntry {
            yield_id,
            investment_id: entry.investment_id,
            base_amount: entry.base_amount,
            yield_rate: entry.yield_rate,
            yield_amount: entry.yield_amount,
            reference_date: entry.reference_date,
            created_at: entry.created_at,
        });
        Ok(true)
    }

    async fn find_cycle(
        &mut self,
        cycle_type: CycleType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> StoreResult<Option<CommissionCycle>> {
        Ok(self
            .staged
            .cycles
            .values()
            .find(|c| {
                c.cycle_type == cycle_type && c.start_date == start_date && c.end_date == end_date
            })
            .cloned())
    }

    async fn insert_cycle(
        &mut self,
        cycle_type: CycleType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Option<CommissionCycle>> {
        if self
            .find_cycle(cycle_type, start_date, end_date)
            .await?
            .is_some()
        {
            return Ok(None);
        }
        let cycle_id = self.staged.next_id();
        let cycle = CommissionCycle {
            cycle_id,
            cycle_type,
            start_date,
            end_date,
            status: CycleStatus::Active,
            created_at,
            completed_at: None,
        };
        self.staged.cycles.insert(cycle_id, cycle.clone());
        Ok(Some(cycle))
    }

    async fn cycle_for_update(&mut self, cycle_id: CycleId) -> StoreResult<Option<CommissionCycle>> {
        Ok(self.staged.cycles.get(&cycle_id).cloned())
    }

    async fn active_cycles(&mut self) -> StoreResult<Vec<CommissionCycle>> {
        Ok(self
            .staged
            .cycles
            .values()
            .filter(|c| c.status == CycleStatus::Active)
            .cloned()
            .collect())
    }

    async fn update_cycle(&mut self, cycle: &CommissionCycle) -> StoreResult<()> {
        let row = self
            .staged
            .cycles
            .get_mut(&cycle.cycle_id)
            .ok_or_else(|| StoreError::Corrupt(format!("cycle {} vanished", cycle.cycle_id)))?;
        row.status = cycle.status;
        row.completed_at = cycle.completed_at;
        Ok(())
    }

    async fn settled_volume_by_rep(
        &mut self,
        kind: WalletKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<RepVolume>> {
        let mut grouped: BTreeMap<SalesRepId, (Decimal, i64)> = BTreeMap::new();
        for t in self.staged.transactions.values() {
            let Some(processed_at) = t.processed_at else {
                continue;
            };
            if t.tx_type != TransactionType::Deposit
                || t.status != TransactionStatus::Completed
                || processed_at < from
                || processed_at >= to
            {
                continue;
            }
            let wallet_matches = self
                .staged
                .wallets
                .get(&t.wallet_id)
                .is_some_and(|w| w.kind == kind);
            if !wallet_matches {
                continue;
            }
            if let Some(rep) = self.staged.sales_reps.get(&t.user_id) {
                let entry = grouped.entry(*rep).or_insert((Decimal::ZERO, 0));
                entry.0 += t.amount;
                entry.1 += 1;
            }
        }
        Ok(grouped
            .into_iter()
            .map(|(sales_rep_id, (volume, transaction_count))| RepVolume {
                sales_rep_id,
                volume,
                transaction_count,
                rule: self.staged.rep_rules.get(&sales_rep_id).copied(),
            })
            .collect())
    }

    async fn delete_unpaid_earnings(&mut self, cycle_id: CycleId) -> StoreResult<u64> {
        let before = self.staged.earnings.len();
        self.staged
            .earnings
            .retain(|_, e| e.cycle_id != cycle_id || e.paid);
        Ok((before - self.staged.earnings.len()) as u64)
    }

    async fn paid_earning_reps(&mut self, cycle_id: CycleId) -> StoreResult<Vec<SalesRepId>> {
        Ok(self
            .staged
            .earnings
            .values()
            .filter(|e| e.cycle_id == cycle_id && e.paid)
            .map(|e| e.sales_rep_id)
            .collect())
    }

    async fn insert_earning(&mut self, new: &NewCommissionEarning) -> StoreResult<CommissionEarning> {
        let earning_id = self.staged.next_id();
        let earning = CommissionEarning {
            earning_id,
            cycle_id: new.cycle_id,
            sales_rep_id: new.sales_rep_id,
            amount: new.amount,
            base_volume: new.base_volume,
            transaction_count: new.transaction_count,
            paid: false,
            paid_at: None,
            payment_reference: None,
            created_at: new.created_at,
        };
        self.staged.earnings.insert(earning_id, earning.clone());
        Ok(earning)
    }

    async fn earning_for_update(
        &mut self,
        earning_id: EarningId,
    ) -> StoreResult<Option<CommissionEarning>> {
        Ok(self.staged.earnings.get(&earning_id).cloned())
    }

    async fn update_earning(&mut self, earning: &CommissionEarning) -> StoreResult<()> {
        let row = self
            .staged
            .earnings
            .get_mut(&earning.earning_id)
            .ok_or_else(|| StoreError::Corrupt(format!("earning {} vanished", earning.earning_id)))?;
        row.paid = earning.paid;
        row.paid_at = earning.paid_at;
        row.payment_reference = earning.payment_reference.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        let injected = this
            .injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(StoreError::Conflict("injected conflict".to_string()));
        }
        let MemoryTx {
            mut guard, staged, ..
        } = this;
        *guard = staged;
        Ok(())
    }
}
