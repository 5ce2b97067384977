//! Recovery engine: compensate for a failed or inconsistent sync session.
//!
//! The compensation rule is deliberately simple and auditable: delete every
//! transaction stamped at or after the broken session's logical clock, then
//! let the normal fetch loop re-derive the page from the pre-failure cursor.

use std::sync::Arc;

use log::{debug, warn};

use super::count_validator::counts_match;
use super::{
    FailedTransaction, FailedTransactions, RowOp, SessionClose, SessionLedger, SessionStatus,
    SyncSession,
};
use crate::errors::{Error, Result, SyncError};
use crate::items::{Item, ItemPatch, ItemRepositoryTrait};
use crate::transactions::TransactionRepositoryTrait;

/// Detects broken prior sessions and compensates by deleting everything
/// written after the last trustworthy point.
#[derive(Clone)]
pub struct RecoveryEngine {
    items: Arc<dyn ItemRepositoryTrait>,
    transactions: Arc<dyn TransactionRepositoryTrait>,
    ledger: SessionLedger,
    max_attempts: i32,
}

impl RecoveryEngine {
    pub fn new(
        items: Arc<dyn ItemRepositoryTrait>,
        transactions: Arc<dyn TransactionRepositoryTrait>,
        ledger: SessionLedger,
        max_attempts: i32,
    ) -> Self {
        Self {
            items,
            transactions,
            ledger,
            max_attempts,
        }
    }

    /// Run one compensation pass for `broken` and return the closed recovery
    /// session.
    ///
    /// On success the item's pointer of record advances to the recovery
    /// session, whose `next_cursor` is the broken session's *input* cursor —
    /// the provider will re-deliver the same page, which the normal loop
    /// re-applies idempotently.
    pub async fn recover(&self, item: &Item, broken: &SyncSession) -> Result<SyncSession> {
        if broken.recovery_attempts >= self.max_attempts {
            return Err(Error::RecoveryFailed(format!(
                "session {} exhausted {} recovery attempts; manual remediation required",
                broken.id, self.max_attempts
            )));
        }

        let boundary = broken.sync_time;
        let stale_rows =
            self.transactions
                .find_synced_at_or_after(&item.id, &item.user_id, boundary)?;
        let expected_removed = stale_rows.len() as i64;

        debug!(
            "Recovering item {}: session {} (sync_time {}) left {} rows to sweep",
            item.id, broken.id, boundary, expected_removed
        );

        // The expected count is durable before the first delete; a crash
        // mid-sweep leaves a mismatched recovery session behind, which the
        // next invocation recovers again from the same boundary.
        let recovery = self
            .ledger
            .create_recovery_session(item, broken, expected_removed)
            .await?;

        let mut removed = 0_i64;
        let mut failed: Vec<FailedTransaction> = Vec::new();
        for row in &stale_rows {
            match self
                .transactions
                .delete_by_provider_id(&row.user_id, &row.provider_transaction_id)
                .await
            {
                Ok(_) => removed += 1,
                Err(err) => {
                    warn!(
                        "Recovery delete failed for transaction {} (item {}): {}",
                        row.provider_transaction_id, item.id, err
                    );
                    failed.push(FailedTransaction {
                        provider_transaction_id: row.provider_transaction_id.clone(),
                        op: RowOp::Removed,
                        payload: serde_json::to_value(row).unwrap_or_default(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let mut counts = recovery.sync_counts;
        counts.actual.removed = Some(removed);
        let swept_clean = counts_match(&counts);

        let error = if swept_clean {
            None
        } else {
            Some(SyncError::recovery_failed(format!(
                "removed {} of {} stale transactions for session {}",
                removed, expected_removed, broken.id
            )))
        };

        let recovery = self
            .ledger
            .close_session(
                &recovery.id,
                SessionClose {
                    status: if swept_clean {
                        SessionStatus::Complete
                    } else {
                        SessionStatus::Error
                    },
                    sync_counts: counts,
                    next_cursor: recovery.next_cursor.clone(),
                    has_more: false,
                    error,
                    failed_transactions: FailedTransactions {
                        removed: failed,
                        ..FailedTransactions::default()
                    },
                },
            )
            .await?;

        if swept_clean {
            self.items
                .update(
                    &item.id,
                    &item.user_id,
                    ItemPatch::default().with_sync_id(recovery.id.clone()),
                )
                .await?;
        }

        Ok(recovery)
    }
}
