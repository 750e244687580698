//! Core types used throughout the system
//!
//! Identifier aliases shared by the ledger, settlement and batch modules.
//! All ids are PostgreSQL BIGINT primary keys.

/// User ID - owner of wallets and investments.
pub type UserId = i64;

/// Wallet ID - one wallet per (user, kind), created lazily.
pub type WalletId = i64;

/// Transaction ID - one row per ledger entry or pending payment.
pub type TransactionId = i64;

/// Investment application ID
pub type InvestmentId = i64;

/// Investment plan ID (plans themselves live outside the ledger)
pub type PlanId = i64;

/// Commission cycle ID
pub type CycleId = i64;

/// Commission earning ID
pub type EarningId = i64;

/// Sales representative ID (a user id with the sales-rep role)
pub type SalesRepId = i64;

/// Audit record ID
pub type AuditId = i64;
