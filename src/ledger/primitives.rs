//! Wallet mutation primitives
//!
//! Every balance change goes through [`credit`] or [`debit`] and is paired
//! with exactly one transaction row: either an existing non-terminal row is
//! settled ([`LedgerRef::Settle`]) or a new row is recorded
//! ([`LedgerRef::Record`]). The caller owns the unit of work; nothing here
//! commits.
//!
//! Lock order inside one call: transaction row, then wallet row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{
    NewAuditEntry, NewTransaction, Transaction, TransactionStatus, TransactionType, Wallet,
    WalletKind,
};
use crate::core_types::{TransactionId, WalletId};
use crate::store::StoreTx;

/// Which transaction row a posting belongs to
#[derive(Debug, Clone)]
pub enum LedgerRef {
    /// Complete an existing PENDING/PROCESSING row
    Settle(TransactionId),
    /// Insert a new row
    Record(EntryDraft),
}

/// A transaction row to be recorded by a primitive
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    /// Requested amount; the posting is `amount + fee`
    pub amount: Decimal,
    pub fee: Decimal,
    pub provider: Option<String>,
    pub external_id: Option<String>,
    pub end_to_end_id: Option<String>,
    pub provider_tx_id: Option<String>,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    /// REFUND only: requested amount of the withdrawal being reversed
    pub withdrawn_reversal: Decimal,
    pub created_at: DateTime<Utc>,
}

impl EntryDraft {
    pub fn new(tx_type: TransactionType, amount: Decimal) -> Self {
        Self {
            tx_type,
            status: TransactionStatus::Completed,
            amount,
            fee: Decimal::ZERO,
            provider: None,
            external_id: None,
            end_to_end_id: None,
            provider_tx_id: None,
            description: None,
            metadata: serde_json::json!({}),
            withdrawn_reversal: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    /// Reversal of a cash-out: gives back `amount + fee`
    pub fn refund(original: &Transaction) -> Self {
        let mut draft = Self::new(TransactionType::Refund, original.total_debited());
        draft.withdrawn_reversal = original.amount;
        draft.provider = original.provider.clone();
        draft.description = Some(format!("Refund of transaction {}", original.transaction_id));
        draft.metadata = serde_json::json!({ "refund_of": original.transaction_id });
        draft
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_provider_tx_id(mut self, provider_tx_id: Option<String>) -> Self {
        self.provider_tx_id = provider_tx_id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    #[inline]
    fn posting(&self) -> Decimal {
        self.amount + self.fee
    }

    fn into_new(self, wallet: &Wallet, balance_after: Option<Decimal>) -> NewTransaction {
        let processed_at = (self.status == TransactionStatus::Completed).then(Utc::now);
        NewTransaction {
            wallet_id: wallet.wallet_id,
            user_id: wallet.user_id,
            tx_type: self.tx_type,
            status: self.status,
            amount: self.amount,
            fee: self.fee,
            provider: self.provider,
            external_id: self.external_id,
            end_to_end_id: self.end_to_end_id,
            provider_tx_id: self.provider_tx_id,
            balance_after,
            description: self.description,
            metadata: self.metadata,
            created_at: self.created_at,
            processed_at,
        }
    }
}

enum Target {
    Existing(Transaction),
    New(EntryDraft),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Credit,
    Debit,
}

/// Add `amount` to the wallet balance
pub async fn credit(
    tx: &mut dyn StoreTx,
    wallet_id: WalletId,
    amount: Decimal,
    reference: LedgerRef,
) -> Result<Transaction, LedgerError> {
    post(tx, wallet_id, amount, reference, Direction::Credit).await
}

/// Remove `amount` from the wallet balance
///
/// Fails with `InsufficientFunds` if the balance would go negative, except
/// for ADJUSTMENT entries.
pub async fn debit(
    tx: &mut dyn StoreTx,
    wallet_id: WalletId,
    amount: Decimal,
    reference: LedgerRef,
) -> Result<Transaction, LedgerError> {
    post(tx, wallet_id, amount, reference, Direction::Debit).await
}

/// Record a PENDING/PROCESSING row without touching the balance
///
/// Cash-in only. A cash-out holds its funds from submission, so it must be
/// recorded through [`debit`] with a non-terminal status instead.
pub async fn open_pending(
    tx: &mut dyn StoreTx,
    wallet_id: WalletId,
    draft: EntryDraft,
) -> Result<Transaction, LedgerError> {
    if draft.amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    if draft.tx_type.is_cash_out() {
        return Err(LedgerError::ReferenceMismatch(format!(
            "{} must be debited when opened",
            draft.tx_type
        )));
    }
    if draft.status.is_terminal() {
        return Err(LedgerError::ReferenceMismatch(format!(
            "open entry cannot start as {}",
            draft.status
        )));
    }
    let wallet = tx
        .wallet_for_update(wallet_id)
        .await?
        .ok_or(LedgerError::WalletNotFound(wallet_id))?;
    let row = tx.insert_transaction(&draft.into_new(&wallet, None)).await?;
    Ok(row)
}

/// Manual signed correction through an ADJUSTMENT entry
pub async fn adjust(
    tx: &mut dyn StoreTx,
    wallet_id: WalletId,
    signed_amount: Decimal,
    reason: &str,
    actor: &str,
) -> Result<Transaction, LedgerError> {
    if signed_amount.is_zero() {
        return Err(LedgerError::InvalidAmount);
    }
    let draft = EntryDraft::new(TransactionType::Adjustment, signed_amount.abs())
        .with_description(reason)
        .with_metadata(serde_json::json!({ "actor": actor, "reason": reason }));
    let row = if signed_amount.is_sign_positive() {
        credit(tx, wallet_id, signed_amount, LedgerRef::Record(draft)).await?
    } else {
        debit(tx, wallet_id, signed_amount.abs(), LedgerRef::Record(draft)).await?
    };

    tx.insert_audit(&NewAuditEntry::for_transaction(
        &row,
        "adjustment",
        actor,
        serde_json::json!({ "amount": signed_amount, "reason": reason }),
        Utc::now(),
    ))
    .await?;
    Ok(row)
}

async fn post(
    tx: &mut dyn StoreTx,
    wallet_id: WalletId,
    amount: Decimal,
    reference: LedgerRef,
    direction: Direction,
) -> Result<Transaction, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }

    // Row first, then wallet
    let target = match reference {
        LedgerRef::Settle(transaction_id) => {
            let row = tx
                .transaction_for_update(transaction_id)
                .await?
                .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
            if row.wallet_id != wallet_id {
                return Err(LedgerError::ReferenceMismatch(format!(
                    "transaction {} belongs to wallet {}, not {}",
                    transaction_id, row.wallet_id, wallet_id
                )));
            }
            if row.status.is_terminal() {
                return Err(LedgerError::AlreadyTerminal(transaction_id, row.status));
            }
            let expected = match direction {
                Direction::Credit => row.amount,
                Direction::Debit => row.total_debited(),
            };
            if expected != amount {
                return Err(LedgerError::ReferenceMismatch(format!(
                    "posting {} does not match transaction {} ({})",
                    amount, transaction_id, expected
                )));
            }
            Target::Existing(row)
        }
        LedgerRef::Record(draft) => {
            if draft.posting() != amount {
                return Err(LedgerError::ReferenceMismatch(format!(
                    "posting {} does not match entry amount {} + fee {}",
                    amount, draft.amount, draft.fee
                )));
            }
            Target::New(draft)
        }
    };

    let mut wallet = tx
        .wallet_for_update(wallet_id)
        .await?
        .ok_or(LedgerError::WalletNotFound(wallet_id))?;

    let (tx_type, fee, reversal) = match &target {
        Target::Existing(row) => (row.tx_type, row.fee, Decimal::ZERO),
        Target::New(draft) => (draft.tx_type, draft.fee, draft.withdrawn_reversal),
    };

    let investment_wallet = wallet.kind == WalletKind::Investment;
    match direction {
        Direction::Credit => {
            wallet.balance += amount;
            if tx_type.is_cash_in()
                || (investment_wallet && tx_type == TransactionType::Investment)
            {
                wallet.total_deposited += amount;
            }
            if tx_type == TransactionType::Refund {
                wallet.total_withdrawn -= reversal;
            }
        }
        Direction::Debit => {
            if wallet.balance < amount && tx_type != TransactionType::Adjustment {
                return Err(LedgerError::InsufficientFunds {
                    balance: wallet.balance,
                    requested: amount,
                });
            }
            wallet.balance -= amount;
            if tx_type.is_cash_out() {
                wallet.total_withdrawn += amount - fee;
            }
            if investment_wallet && tx_type == TransactionType::Return {
                wallet.total_withdrawn += amount;
            }
        }
    }
    tx.update_wallet(&wallet).await?;

    let row = match target {
        Target::Existing(mut row) => {
            row.status = TransactionStatus::Completed;
            row.balance_after = Some(wallet.balance);
            row.processed_at = Some(Utc::now());
            tx.update_transaction(&row).await?;
            row
        }
        Target::New(draft) => {
            tx.insert_transaction(&draft.into_new(&wallet, Some(wallet.balance)))
                .await?
        }
    };

    tracing::debug!(
        wallet_id,
        transaction_id = row.transaction_id,
        tx_type = %row.tx_type,
        amount = %amount,
        balance_after = %wallet.balance,
        "ledger posting"
    );
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LedgerStore, MemoryStore};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn funded(store: &MemoryStore, balance: &str) -> WalletId {
        let mut tx = store.begin().await.unwrap();
        let wallet_id = tx.wallet_id_for(1, WalletKind::Pix).await.unwrap();
        if d(balance) > Decimal::ZERO {
            let draft = EntryDraft::new(TransactionType::Deposit, d(balance));
            credit(tx.as_mut(), wallet_id, d(balance), LedgerRef::Record(draft))
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();
        wallet_id
    }

    #[tokio::test]
    async fn test_credit_then_debit_round_trip() {
        let store = MemoryStore::new();
        let wallet_id = funded(&store, "50.00").await;

        let mut tx = store.begin().await.unwrap();
        let a = d("12.34");
        let credited = credit(
            tx.as_mut(),
            wallet_id,
            a,
            LedgerRef::Record(EntryDraft::new(TransactionType::TransferIn, a)),
        )
        .await
        .unwrap();
        let debited = debit(
            tx.as_mut(),
            wallet_id,
            a,
            LedgerRef::Record(EntryDraft::new(TransactionType::TransferOut, a)),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.wallets[&wallet_id].balance, d("50.00"));
        assert_eq!(
            credited.balance_after.unwrap() - debited.balance_after.unwrap(),
            a
        );
    }

    #[tokio::test]
    async fn test_debit_rejects_overdraft() {
        let store = MemoryStore::new();
        let wallet_id = funded(&store, "10.00").await;

        let mut tx = store.begin().await.unwrap();
        let draft = EntryDraft::new(TransactionType::Withdrawal, d("10.00")).with_fee(d("0.50"));
        let err = debit(tx.as_mut(), wallet_id, d("10.50"), LedgerRef::Record(draft))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn test_adjustment_may_overdraw() {
        let store = MemoryStore::new();
        let wallet_id = funded(&store, "1.00").await;

        let mut tx = store.begin().await.unwrap();
        adjust(tx.as_mut(), wallet_id, d("-3.00"), "chargeback", "ops")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.wallets[&wallet_id].balance, d("-2.00"));
        assert_eq!(state.audit.len(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let store = MemoryStore::new();
        let wallet_id = funded(&store, "0").await;

        let mut tx = store.begin().await.unwrap();
        let draft = EntryDraft::new(TransactionType::Deposit, Decimal::ZERO);
        let err = credit(tx.as_mut(), wallet_id, Decimal::ZERO, LedgerRef::Record(draft))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount));
    }

    #[tokio::test]
    async fn test_settle_pending_row() {
        let store = MemoryStore::new();
        let wallet_id = funded(&store, "50.00").await;

        let mut tx = store.begin().await.unwrap();
        let pending = open_pending(
            tx.as_mut(),
            wallet_id,
            EntryDraft::new(TransactionType::Deposit, d("100.00"))
                .with_status(TransactionStatus::Pending),
        )
        .await
        .unwrap();
        let settled = credit(
            tx.as_mut(),
            wallet_id,
            d("100.00"),
            LedgerRef::Settle(pending.transaction_id),
        )
        .await
        .unwrap();
        assert_eq!(settled.status, TransactionStatus::Completed);
        assert_eq!(settled.balance_after, Some(d("150.00")));

        // a second settle of the same row is refused
        let err = credit(
            tx.as_mut(),
            wallet_id,
            d("100.00"),
            LedgerRef::Settle(pending.transaction_id),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyTerminal(..)));
    }

    #[tokio::test]
    async fn test_open_pending_refuses_cash_out() {
        let store = MemoryStore::new();
        let wallet_id = funded(&store, "0").await;

        let mut tx = store.begin().await.unwrap();
        for tx_type in [TransactionType::Withdrawal, TransactionType::TransferOut] {
            let draft = EntryDraft::new(tx_type, d("30.00")).with_status(TransactionStatus::Pending);
            let err = open_pending(tx.as_mut(), wallet_id, draft).await.unwrap_err();
            assert!(matches!(err, LedgerError::ReferenceMismatch(_)));
        }
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        assert!(state.transactions_of_wallet(wallet_id).is_empty());
    }

    #[tokio::test]
    async fn test_refund_restores_withdrawn_total() {
        let store = MemoryStore::new();
        let wallet_id = funded(&store, "100.00").await;

        let mut tx = store.begin().await.unwrap();
        let draft = EntryDraft::new(TransactionType::Withdrawal, d("30.00"))
            .with_fee(d("2.00"))
            .with_status(TransactionStatus::Processing);
        let withdrawal = debit(tx.as_mut(), wallet_id, d("32.00"), LedgerRef::Record(draft))
            .await
            .unwrap();
        let wallet = tx.wallet_for_update(wallet_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance, d("68.00"));
        assert_eq!(wallet.total_withdrawn, d("30.00"));

        let refund = EntryDraft::refund(&withdrawal);
        credit(tx.as_mut(), wallet_id, d("32.00"), LedgerRef::Record(refund))
            .await
            .unwrap();
        let wallet = tx.wallet_for_update(wallet_id).await.unwrap().unwrap();
        assert_eq!(wallet.balance, d("100.00"));
        assert_eq!(wallet.total_withdrawn, Decimal::ZERO);
    }
}
