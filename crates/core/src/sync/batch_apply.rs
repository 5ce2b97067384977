//! Batch apply helpers: add/modify/remove one page of upstream records.
//!
//! Rows are processed independently, never all-or-nothing — one bad row must
//! not block the rest of the page. Failures are captured with their full
//! payloads for manual remediation.

use std::sync::Arc;

use log::warn;

use super::{FailedTransaction, RowOp, SyncSession};
use crate::items::Item;
use crate::transactions::{
    RemovedTransaction, Transaction, TransactionRecord, TransactionRepositoryTrait,
};

/// Outcome of applying one bucket of a page.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub success_count: i64,
    pub failed: Vec<FailedTransaction>,
}

/// Upsert every added record. Idempotent by provider transaction id.
pub async fn apply_added(
    transactions: &Arc<dyn TransactionRepositoryTrait>,
    item: &Item,
    session: &SyncSession,
    records: &[TransactionRecord],
) -> BatchOutcome {
    apply_upserts(transactions, item, session, records, RowOp::Added).await
}

/// Upsert every modified record, matched by provider transaction id.
pub async fn apply_modified(
    transactions: &Arc<dyn TransactionRepositoryTrait>,
    item: &Item,
    session: &SyncSession,
    records: &[TransactionRecord],
) -> BatchOutcome {
    apply_upserts(transactions, item, session, records, RowOp::Modified).await
}

async fn apply_upserts(
    transactions: &Arc<dyn TransactionRepositoryTrait>,
    item: &Item,
    session: &SyncSession,
    records: &[TransactionRecord],
    op: RowOp,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for record in records {
        let row = Transaction::from_record(record, item, session.cursor.as_deref(), session.sync_time);
        match transactions.upsert(row).await {
            Ok(_) => outcome.success_count += 1,
            Err(err) => {
                warn!(
                    "Failed to apply {:?} transaction {} for item {}: {}",
                    op, record.transaction_id, item.id, err
                );
                outcome.failed.push(FailedTransaction {
                    provider_transaction_id: record.transaction_id.clone(),
                    op,
                    payload: serde_json::to_value(record).unwrap_or_default(),
                    error: err.to_string(),
                });
            }
        }
    }
    outcome
}

/// Delete every removed reference. Deleting an absent row still counts as a
/// success — removal is idempotent by nature.
pub async fn apply_removed(
    transactions: &Arc<dyn TransactionRepositoryTrait>,
    item: &Item,
    records: &[RemovedTransaction],
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for record in records {
        match transactions
            .delete_by_provider_id(&item.user_id, &record.transaction_id)
            .await
        {
            Ok(_) => outcome.success_count += 1,
            Err(err) => {
                warn!(
                    "Failed to remove transaction {} for item {}: {}",
                    record.transaction_id, item.id, err
                );
                outcome.failed.push(FailedTransaction {
                    provider_transaction_id: record.transaction_id.clone(),
                    op: RowOp::Removed,
                    payload: serde_json::to_value(record).unwrap_or_default(),
                    error: err.to_string(),
                });
            }
        }
    }
    outcome
}
