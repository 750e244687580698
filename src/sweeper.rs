//! Expiration Sweeper
//!
//! Batch pass that force-fails PENDING deposits older than the TTL. The
//! candidate scan does not lock; every row is re-locked and re-checked in
//! its own unit of work, so a completion that commits first wins and the
//! sweeper skips the row.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::core_types::{TransactionId, UserId};
use crate::ledger::{NewAuditEntry, TransactionStatus};
use crate::store::{LedgerStore, StoreError};

pub const EXPIRED_REASON: &str = "expired";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Age after which a PENDING deposit is expired
    pub ttl_minutes: i64,
    /// Maximum rows handled per pass
    pub batch_size: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 15,
            batch_size: 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Stale scan failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepSummary {
    pub found: usize,
    pub updated: usize,
    pub failed: usize,
    pub affected_users: Vec<UserId>,
}

enum RowOutcome {
    Expired(UserId),
    Skipped,
}

pub struct ExpirationSweeper {
    store: Arc<dyn LedgerStore>,
    config: SweeperConfig,
}

impl ExpirationSweeper {
    pub fn new(store: Arc<dyn LedgerStore>, config: SweeperConfig) -> Self {
        Self { store, config }
    }

    /// One bounded pass. Re-running is a no-op for rows already handled.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepSummary, SweepError> {
        let cutoff = now - Duration::minutes(self.config.ttl_minutes);
        let candidates = {
            let mut tx = self.store.begin().await?;
            tx.stale_pending_deposits(cutoff, self.config.batch_size)
                .await?
        };

        let mut summary = SweepSummary {
            found: candidates.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            debug!("No stale pending deposits");
            return Ok(summary);
        }

        let mut users = BTreeSet::new();
        for candidate in &candidates {
            match self.expire_one(candidate.transaction_id, cutoff, now).await {
                Ok(RowOutcome::Expired(user_id)) => {
                    summary.updated += 1;
                    users.insert(user_id);
                }
                Ok(RowOutcome::Skipped) => {
                    debug!(
                        transaction_id = candidate.transaction_id,
                        "Row changed since scan, skipped"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        transaction_id = candidate.transaction_id,
                        error = %e,
                        "Failed to expire pending deposit"
                    );
                }
            }
        }
        summary.affected_users = users.into_iter().collect();

        info!(
            found = summary.found,
            updated = summary.updated,
            failed = summary.failed,
            ttl_minutes = self.config.ttl_minutes,
            "Expiration sweep finished"
        );
        Ok(summary)
    }

    async fn expire_one(
        &self,
        transaction_id: TransactionId,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RowOutcome, StoreError> {
        let mut tx = self.store.begin().await?;
        let Some(mut row) = tx.transaction_for_update(transaction_id).await? else {
            return Ok(RowOutcome::Skipped);
        };
        if row.status != TransactionStatus::Pending || row.created_at >= cutoff {
            return Ok(RowOutcome::Skipped);
        }

        row.status = TransactionStatus::Failed;
        row.failure_reason = Some(EXPIRED_REASON.to_string());
        row.processed_at = Some(now);
        if let Some(obj) = row.metadata.as_object_mut() {
            obj.insert("expired_at".to_string(), serde_json::json!(now));
        }
        tx.update_transaction(&row).await?;
        tx.insert_audit(&NewAuditEntry::for_transaction(
            &row,
            "expired",
            "sweeper",
            serde_json::json!({
                "ttl_minutes": self.config.ttl_minutes,
                "created_at": row.created_at,
                "amount": row.amount,
            }),
            now,
        ))
        .await?;
        tx.commit().await?;

        Ok(RowOutcome::Expired(row.user_id))
    }
}
