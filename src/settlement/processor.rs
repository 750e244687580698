//! Settlement Processor
//!
//! Applies one canonical webhook event to the ledger inside one unit of
//! work. The resolved transaction row is locked before anything is decided,
//! so concurrent deliveries of the same event serialize on it and all but
//! the first observe a terminal status.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::SettlementError;
use super::{SettlementConfig, SettlementOutcome};
use crate::core_types::TransactionId;
use crate::ledger::{
    self, EntryDraft, LedgerError, LedgerRef, NewAuditEntry, Transaction, TransactionStatus,
};
use crate::store::{LedgerStore, StoreTx};
use crate::webhook::{CanonicalStatus, CanonicalWebhookEvent, EventKind};

const ACTOR_WEBHOOK: &str = "webhook";

pub struct SettlementProcessor {
    store: Arc<dyn LedgerStore>,
    config: SettlementConfig,
}

impl SettlementProcessor {
    pub fn new(store: Arc<dyn LedgerStore>, config: SettlementConfig) -> Self {
        Self { store, config }
    }

    /// Apply an event exactly once
    ///
    /// A store conflict (serialization failure, deadlock) is retried once.
    pub async fn process(
        &self,
        event: &CanonicalWebhookEvent,
    ) -> Result<SettlementOutcome, SettlementError> {
        self.with_retry(event, None, ACTOR_WEBHOOK).await
    }

    /// Re-drive a stored transaction through the guarded path
    ///
    /// Used for manual retry; a row that is already COMPLETED stays
    /// untouched.
    pub async fn reprocess(
        &self,
        transaction_id: TransactionId,
        status: CanonicalStatus,
        actor: &str,
    ) -> Result<SettlementOutcome, SettlementError> {
        let row = {
            let mut tx = self.store.begin().await?;
            tx.transaction_for_update(transaction_id)
                .await?
                .ok_or_else(|| SettlementError::TransactionNotFound(transaction_id.to_string()))?
        };

        let event = CanonicalWebhookEvent {
            provider: row.provider.clone().unwrap_or_else(|| "manual".to_string()),
            external_id: row
                .external_id
                .clone()
                .unwrap_or_else(|| transaction_id.to_string()),
            end_to_end_id: row.end_to_end_id.clone(),
            provider_tx_id: row.provider_tx_id.clone(),
            kind: if row.tx_type.is_cash_out() {
                EventKind::CashOut
            } else {
                EventKind::CashIn
            },
            status,
            amount: None,
            timestamp: Utc::now(),
            payer: Default::default(),
            raw: serde_json::json!({ "reprocess": true, "actor": actor }),
        };

        self.with_retry(&event, Some(transaction_id), actor).await
    }

    async fn with_retry(
        &self,
        event: &CanonicalWebhookEvent,
        target: Option<TransactionId>,
        actor: &str,
    ) -> Result<SettlementOutcome, SettlementError> {
        match self.apply(event, target, actor).await {
            Err(e) if e.is_conflict() => {
                warn!(
                    external_id = %event.external_id,
                    provider = %event.provider,
                    error = %e,
                    "Settlement conflict, retrying once"
                );
                self.apply(event, target, actor).await.map_err(|e| {
                    if e.is_conflict() {
                        SettlementError::ConcurrentModification(e.to_string())
                    } else {
                        e
                    }
                })
            }
            other => other,
        }
    }

    async fn apply(
        &self,
        event: &CanonicalWebhookEvent,
        target: Option<TransactionId>,
        actor: &str,
    ) -> Result<SettlementOutcome, SettlementError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let found = match target {
            Some(id) => tx.transaction_for_update(id).await?,
            None => self.resolve(tx.as_mut(), event, now).await?,
        };
        let Some(mut row) = found else {
            return Err(SettlementError::TransactionNotFound(event.external_id.clone()));
        };

        check_kind(&row, event)?;

        if row.status == TransactionStatus::Completed {
            info!(
                transaction_id = row.transaction_id,
                external_id = %event.external_id,
                status = %event.status,
                "Transaction already settled, dropping event"
            );
            return Ok(SettlementOutcome::AlreadySettled {
                transaction_id: row.transaction_id,
            });
        }

        let mut history = event.history_entry(now);
        if let Some(amount) = event.amount
            && amount != row.amount
        {
            warn!(
                transaction_id = row.transaction_id,
                expected = %row.amount,
                reported = %amount,
                "Provider amount differs from transaction amount"
            );
            history["amount_mismatch"] = serde_json::Value::Bool(true);
        }

        if row.status.is_terminal() {
            history["late"] = serde_json::Value::Bool(true);
            append_history(&mut row, history);
            tx.update_transaction(&row).await?;
            tx.insert_audit(&NewAuditEntry::for_transaction(
                &row,
                "late_event",
                actor,
                serde_json::json!({
                    "stored_status": row.status,
                    "event_status": event.status,
                    "provider": event.provider,
                }),
                now,
            ))
            .await?;
            tx.commit().await?;

            warn!(
                transaction_id = row.transaction_id,
                stored_status = %row.status,
                event_status = %event.status,
                "Late event on terminal transaction, recorded for reconciliation"
            );
            return Ok(SettlementOutcome::LateEvent {
                transaction_id: row.transaction_id,
                status: row.status,
            });
        }

        append_history(&mut row, history);
        if row.end_to_end_id.is_none() {
            row.end_to_end_id = event.end_to_end_id.clone();
        }
        if row.provider_tx_id.is_none() {
            row.provider_tx_id = event.provider_tx_id.clone();
        }

        let outcome = match (event.status, row.tx_type.is_cash_in(), row.tx_type.is_cash_out()) {
            (CanonicalStatus::Completed, true, _) => {
                tx.update_transaction(&row).await?;
                let settled = ledger::credit(
                    tx.as_mut(),
                    row.wallet_id,
                    row.amount,
                    LedgerRef::Settle(row.transaction_id),
                )
                .await?;
                SettlementOutcome::Credited {
                    transaction_id: settled.transaction_id,
                    balance_after: settled.balance_after.unwrap_or_default(),
                }
            }
            (status, _, true) if status.is_failure() => {
                let reason = status.as_str().to_lowercase();
                let transaction_id = row.transaction_id;
                match fail_withdrawal(tx.as_mut(), row, &reason, now).await? {
                    Some(refund) => SettlementOutcome::Refunded {
                        transaction_id: refund.refund_of,
                        refund_id: refund.transaction_id,
                    },
                    None => SettlementOutcome::StatusUpdated {
                        transaction_id,
                        status: TransactionStatus::Failed,
                    },
                }
            }
            (status, _, _) => {
                row.status = match status {
                    CanonicalStatus::Completed => TransactionStatus::Completed,
                    CanonicalStatus::Failed | CanonicalStatus::Cancelled => {
                        row.failure_reason = Some(status.as_str().to_lowercase());
                        TransactionStatus::Failed
                    }
                    CanonicalStatus::Processing => TransactionStatus::Processing,
                };
                if row.status.is_terminal() {
                    row.processed_at = Some(now);
                }
                tx.update_transaction(&row).await?;
                SettlementOutcome::StatusUpdated {
                    transaction_id: row.transaction_id,
                    status: row.status,
                }
            }
        };

        if target.is_some() {
            tx.insert_audit(&NewAuditEntry {
                entity: "transaction",
                entity_id: outcome.transaction_id(),
                action: "reprocess",
                actor: actor.to_string(),
                user_id: None,
                details: serde_json::json!({
                    "status": event.status,
                    "outcome": outcome.as_str(),
                }),
                created_at: now,
            })
            .await?;
        }

        tx.commit().await?;

        info!(
            transaction_id = outcome.transaction_id(),
            provider = %event.provider,
            status = %event.status,
            outcome = outcome.as_str(),
            "Settlement applied"
        );
        Ok(outcome)
    }

    /// externalId, then endToEndId, then the indexed providerTxId lookup
    /// over open rows inside the look-back window
    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        event: &CanonicalWebhookEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<Transaction>, SettlementError> {
        if let Some(row) = tx.find_by_external_id_for_update(&event.external_id).await? {
            return Ok(Some(row));
        }
        if let Some(ref e2e) = event.end_to_end_id
            && let Some(row) = tx.find_by_end_to_end_id_for_update(e2e).await?
        {
            return Ok(Some(row));
        }
        if let Some(ref ptx) = event.provider_tx_id {
            let since = now - Duration::hours(self.config.lookup_window_hours);
            return Ok(tx.find_open_by_provider_tx_id_for_update(ptx, since).await?);
        }
        Ok(None)
    }
}

fn check_kind(row: &Transaction, event: &CanonicalWebhookEvent) -> Result<(), SettlementError> {
    let mismatch = match event.kind {
        EventKind::CashIn => row.tx_type.is_cash_out(),
        EventKind::CashOut => row.tx_type.is_cash_in(),
    };
    if mismatch {
        return Err(SettlementError::KindMismatch {
            transaction_id: row.transaction_id,
            tx_type: row.tx_type,
            kind: event.kind,
        });
    }
    Ok(())
}

fn append_history(row: &mut Transaction, entry: serde_json::Value) {
    if !row.metadata.is_object() {
        row.metadata = serde_json::json!({});
    }
    if let Some(obj) = row.metadata.as_object_mut() {
        let webhooks = obj
            .entry("webhooks")
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if let Some(list) = webhooks.as_array_mut() {
            list.push(entry);
        }
    }
}

/// REFUND entry created for a failed cash-out
pub(crate) struct Refund {
    pub transaction_id: TransactionId,
    pub refund_of: TransactionId,
}

/// Mark a locked cash-out row FAILED and return `amount + fee` to its
/// wallet as a REFUND entry
///
/// Only a row that was actually debited (`balance_after` set) is refunded;
/// anything else is closed with no balance effect and `None` is returned.
pub(crate) async fn fail_withdrawal(
    tx: &mut dyn StoreTx,
    mut row: Transaction,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Option<Refund>, LedgerError> {
    if row.status.is_terminal() {
        return Err(LedgerError::AlreadyTerminal(row.transaction_id, row.status));
    }
    row.status = TransactionStatus::Failed;
    row.failure_reason = Some(reason.to_string());
    row.processed_at = Some(now);
    tx.update_transaction(&row).await?;

    if row.balance_after.is_none() {
        warn!(
            transaction_id = row.transaction_id,
            reason, "Cash-out failed before any debit, nothing to refund"
        );
        return Ok(None);
    }

    let refund = ledger::credit(
        tx,
        row.wallet_id,
        row.total_debited(),
        LedgerRef::Record(EntryDraft::refund(&row)),
    )
    .await?;

    warn!(
        transaction_id = row.transaction_id,
        refund_id = refund.transaction_id,
        amount = %row.total_debited(),
        reason,
        "Cash-out failed, refunded"
    );
    Ok(Some(Refund {
        transaction_id: refund.transaction_id,
        refund_of: row.transaction_id,
    }))
}
