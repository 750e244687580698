//! Ledger
//!
//! Wallets, transaction rows and the atomic credit/debit primitives that
//! are the only way a wallet balance changes.

pub mod error;
pub mod primitives;
pub mod types;

pub use error::LedgerError;
pub use primitives::{EntryDraft, LedgerRef, adjust, credit, debit, open_pending};
pub use types::{
    AuditEntry, NewAuditEntry, NewTransaction, Transaction, TransactionStatus, TransactionType,
    Wallet, WalletKind,
};
