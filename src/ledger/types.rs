//! Ledger record types
//!
//! Wallets, transaction rows and audit records. Enum values are persisted
//! as their `as_str()` text form.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core_types::{AuditId, TransactionId, UserId, WalletId};

/// Wallet variant. A user owns at most one wallet of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletKind {
    /// BRL balance settled over the PIX rail
    Pix,
    /// USDT balance (crypto purchases, yield payouts)
    Usdt,
    /// Aggregate of a user's investment applications
    Investment,
}

impl WalletKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletKind::Pix => "PIX",
            WalletKind::Usdt => "USDT",
            WalletKind::Investment => "INVESTMENT",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PIX" => Ok(WalletKind::Pix),
            "USDT" => Ok(WalletKind::Usdt),
            "INVESTMENT" => Ok(WalletKind::Investment),
            _ => Err(format!("Invalid wallet kind: {}", s)),
        }
    }
}

/// Transaction row type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Investment,
    Return,
    TransferIn,
    TransferOut,
    Adjustment,
    /// Reversal of a failed withdrawal (amount + fee back to the wallet)
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Investment => "INVESTMENT",
            TransactionType::Return => "RETURN",
            TransactionType::TransferIn => "TRANSFER_IN",
            TransactionType::TransferOut => "TRANSFER_OUT",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::Refund => "REFUND",
        }
    }

    /// Inbound settlement (provider cash-in)
    #[inline]
    pub fn is_cash_in(&self) -> bool {
        matches!(self, TransactionType::Deposit | TransactionType::TransferIn)
    }

    /// Outbound settlement (provider cash-out); funds leave at request time
    #[inline]
    pub fn is_cash_out(&self) -> bool {
        matches!(
            self,
            TransactionType::Withdrawal | TransactionType::TransferOut
        )
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "INVESTMENT" => Ok(TransactionType::Investment),
            "RETURN" => Ok(TransactionType::Return),
            "TRANSFER_IN" => Ok(TransactionType::TransferIn),
            "TRANSFER_OUT" => Ok(TransactionType::TransferOut),
            "ADJUSTMENT" => Ok(TransactionType::Adjustment),
            "REFUND" => Ok(TransactionType::Refund),
            _ => Err(format!("Invalid transaction type: {}", s)),
        }
    }
}

/// Transaction status
///
/// Terminal states: COMPLETED, FAILED, EXPIRED. Balance-affecting
/// transitions only ever start from PENDING or PROCESSING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Expired,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Expired => "EXPIRED",
        }
    }

    /// No further status or balance transition is accepted
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Expired
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "PROCESSING" => Ok(TransactionStatus::Processing),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "EXPIRED" => Ok(TransactionStatus::Expired),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

/// Wallet row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wallet {
    pub wallet_id: WalletId,
    pub user_id: UserId,
    pub kind: WalletKind,
    pub balance: Decimal,
    pub frozen_balance: Decimal,
    pub total_deposited: Decimal,
    pub total_withdrawn: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Transaction row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub wallet_id: WalletId,
    pub user_id: UserId,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    /// Requested amount (fee excluded)
    pub amount: Decimal,
    pub fee: Decimal,
    pub provider: Option<String>,
    /// Our order id as known by the provider
    pub external_id: Option<String>,
    /// PIX end-to-end id
    pub end_to_end_id: Option<String>,
    /// The provider's own transaction id
    pub provider_tx_id: Option<String>,
    pub balance_after: Option<Decimal>,
    pub failure_reason: Option<String>,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Total amount that left the wallet for a cash-out (amount + fee)
    #[inline]
    pub fn total_debited(&self) -> Decimal {
        self.amount + self.fee
    }
}

/// Insert payload for a transaction row
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub wallet_id: WalletId,
    pub user_id: UserId,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub fee: Decimal,
    pub provider: Option<String>,
    pub external_id: Option<String>,
    pub end_to_end_id: Option<String>,
    pub provider_tx_id: Option<String>,
    pub balance_after: Option<Decimal>,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Audit record (one per sweeper expiry, late event, manual action)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub audit_id: AuditId,
    pub entity: String,
    pub entity_id: i64,
    pub action: String,
    pub actor: String,
    pub user_id: Option<UserId>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub entity: &'static str,
    pub entity_id: i64,
    pub action: &'static str,
    pub actor: String,
    pub user_id: Option<UserId>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewAuditEntry {
    /// Audit record about a transaction row
    pub fn for_transaction(
        tx: &Transaction,
        action: &'static str,
        actor: impl Into<String>,
        details: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity: "transaction",
            entity_id: tx.transaction_id,
            action,
            actor: actor.into(),
            user_id: Some(tx.user_id),
            details,
            created_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Expired.is_terminal());

        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Processing.is_terminal());
    }

    #[test]
    fn test_cash_direction() {
        assert!(TransactionType::Deposit.is_cash_in());
        assert!(TransactionType::TransferIn.is_cash_in());
        assert!(TransactionType::Withdrawal.is_cash_out());
        assert!(TransactionType::TransferOut.is_cash_out());
        assert!(!TransactionType::Refund.is_cash_in());
        assert!(!TransactionType::Investment.is_cash_out());
    }

    #[test]
    fn test_text_form_matches_serde() {
        let json = serde_json::to_string(&TransactionType::TransferOut).unwrap();
        assert_eq!(json, "\"TRANSFER_OUT\"");
        assert_eq!(
            "TRANSFER_OUT".parse::<TransactionType>().unwrap(),
            TransactionType::TransferOut
        );
        assert_eq!("usdt".parse::<WalletKind>().unwrap(), WalletKind::Usdt);
        assert!("BOGUS".parse::<TransactionStatus>().is_err());
    }
}
