//! paygate - PIX / USDT payment gateway settlement engine
//!
//! Turns asynchronous, duplicated, out-of-order provider webhooks into
//! exactly-once ledger movements, and runs the periodic batches that keep
//! the ledger consistent.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier aliases (UserId, WalletId, ...)
//! - [`store`] - Datastore seam (PostgreSQL and in-memory backends)
//! - [`ledger`] - Wallets, transaction rows, credit/debit primitives
//! - [`webhook`] - Per-provider payload normalizers
//! - [`settlement`] - Idempotent application of webhook events
//! - [`sweeper`] - Expiration of stale PENDING deposits
//! - [`investment`] - Applications, daily yield accrual, liquidation
//! - [`commission`] - Sales-rep commission cycles
//! - [`funding`] - Deposit opening, payouts, manual adjustments
//! - [`gateway`] - HTTP ingress (axum)

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod db;
pub mod logging;

pub mod ledger;
pub mod store;

pub mod settlement;
pub mod sweeper;
pub mod webhook;

pub mod commission;
pub mod funding;
pub mod investment;

pub mod gateway;

// Convenient re-exports at crate root
pub use core_types::{TransactionId, UserId, WalletId};
pub use ledger::{LedgerError, Transaction, TransactionStatus, TransactionType, Wallet, WalletKind};
pub use settlement::{SettlementOutcome, SettlementProcessor};
pub use store::{LedgerStore, MemoryStore, PgStore, StoreError};
pub use webhook::{CanonicalWebhookEvent, NormalizerRegistry};
