//! Ledger Store
//!
//! The datastore collaborator behind every ledger-affecting operation.
//!
//! # Contract
//!
//! A [`StoreTx`] is one atomic unit of work:
//! - All writes become visible together on [`StoreTx::commit`]
//! - Dropping a `StoreTx` without committing discards every write
//! - `*_for_update` reads take a row lock held until commit/drop
//! - Unique constraints (yield day, cycle boundaries, external ids) are
//!   enforced by the store, not by callers
//!
//! Callers never hold two `StoreTx` at the same time.
//!
//! Two backends: [`postgres::PgStore`] (production) and
//! [`memory::MemoryStore`] (standalone runs and tests).

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::commission::types::{
    CommissionCycle, CommissionEarning, CycleType, NewCommissionEarning, RepVolume,
};
use crate::core_types::{CycleId, EarningId, InvestmentId, SalesRepId, TransactionId, UserId, WalletId};
use crate::investment::types::{InvestmentApplication, NewInvestment, NewYieldEntry};
use crate::ledger::types::{NewAuditEntry, NewTransaction, Transaction, Wallet, WalletKind};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization failure or deadlock; the unit of work may be retried
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Unique constraint violated: {0}")]
    Duplicate(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => return StoreError::Conflict(db_err.to_string()),
                // unique_violation
                Some("23505") => return StoreError::Duplicate(db_err.to_string()),
                _ => {}
            }
        }
        StoreError::Database(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Entry point: opens atomic units of work
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Begin an atomic unit of work
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    /// Liveness probe
    async fn ping(&self) -> StoreResult<()>;
}

/// One atomic unit of work against the ledger tables
#[async_trait]
pub trait StoreTx: Send {
    // === Wallets ===

    /// Find the wallet for (user, kind), creating an empty one if missing.
    /// Does not lock.
    async fn wallet_id_for(&mut self, user_id: UserId, kind: WalletKind) -> StoreResult<WalletId>;

    async fn wallet_for_update(&mut self, wallet_id: WalletId) -> StoreResult<Option<Wallet>>;

    /// Persist balance and totals of a wallet previously locked in this unit
    async fn update_wallet(&mut self, wallet: &Wallet) -> StoreResult<()>;

    // === Transactions ===

    async fn insert_transaction(&mut self, new: &NewTransaction) -> StoreResult<Transaction>;

    async fn transaction_for_update(
        &mut self,
        transaction_id: TransactionId,
    ) -> StoreResult<Option<Transaction>>;

    async fn find_by_external_id_for_update(
        &mut self,
        external_id: &str,
    ) -> StoreResult<Option<Transaction>>;

    async fn find_by_end_to_end_id_for_update(
        &mut self,
        end_to_end_id: &str,
    ) -> StoreResult<Option<Transaction>>;

    /// Indexed lookup on the provider transaction id, restricted to
    /// PENDING/PROCESSING rows created at or after `created_since`
    async fn find_open_by_provider_tx_id_for_update(
        &mut self,
        provider_tx_id: &str,
        created_since: DateTime<Utc>,
    ) -> StoreResult<Option<Transaction>>;

    /// Persist status, correlation ids, snapshot and metadata of a row
    /// previously locked in this unit
    async fn update_transaction(&mut self, tx: &Transaction) -> StoreResult<()>;

    /// PENDING deposits created before `created_before`, oldest first
    async fn stale_pending_deposits(
        &mut self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Transaction>>;

    // === Audit ===

    async fn insert_audit(&mut self, entry: &NewAuditEntry) -> StoreResult<()>;

    // === Investments ===

    async fn insert_investment(&mut self, new: &NewInvestment) -> StoreResult<InvestmentApplication>;

    async fn active_investment_ids(&mut self) -> StoreResult<Vec<InvestmentId>>;

    async fn investment_for_update(
        &mut self,
        investment_id: InvestmentId,
    ) -> StoreResult<Option<InvestmentApplication>>;

    async fn update_investment(&mut self, investment: &InvestmentApplication) -> StoreResult<()>;

    /// Returns `false` when an entry for (investment, reference date) exists
    async fn insert_yield_entry(&mut self, entry: &NewYieldEntry) -> StoreResult<bool>;

    // === Commission cycles ===

    async fn find_cycle(
        &mut self,
        cycle_type: CycleType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> StoreResult<Option<CommissionCycle>>;

    /// Insert an ACTIVE cycle. Returns `None` if identical boundaries exist.
    async fn insert_cycle(
        &mut self,
        cycle_type: CycleType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Option<CommissionCycle>>;

    async fn cycle_for_update(&mut self, cycle_id: CycleId) -> StoreResult<Option<CommissionCycle>>;

    async fn active_cycles(&mut self) -> StoreResult<Vec<CommissionCycle>>;

    async fn update_cycle(&mut self, cycle: &CommissionCycle) -> StoreResult<()>;

    /// COMPLETED deposits on `kind` wallets processed in `[from, to)`,
    /// grouped by the depositor's sales rep
    async fn settled_volume_by_rep(
        &mut self,
        kind: WalletKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<RepVolume>>;

    async fn delete_unpaid_earnings(&mut self, cycle_id: CycleId) -> StoreResult<u64>;

    async fn paid_earning_reps(&mut self, cycle_id: CycleId) -> StoreResult<Vec<SalesRepId>>;

    async fn insert_earning(&mut self, new: &NewCommissionEarning) -> StoreResult<CommissionEarning>;

    async fn earning_for_update(
        &mut self,
        earning_id: EarningId,
    ) -> StoreResult<Option<CommissionEarning>>;

    async fn update_earning(&mut self, earning: &CommissionEarning) -> StoreResult<()>;

    // === Unit of work ===

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
