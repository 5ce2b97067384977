//! Sync orchestrator: the top-level state machine sequencing lock, history
//! lookup, recovery, fetch, apply, validation, and release.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::{debug, error, warn};

use super::batch_apply::{apply_added, apply_modified, apply_removed};
use super::count_validator::counts_match;
use super::sync_scheduler::{SYNC_MAX_RECOVERY_ATTEMPTS, SYNC_STALENESS_WINDOW_SECS};
use super::{
    AggregatorGateway, CountSet, CountValidation, FailedTransaction, FailedTransactions,
    RecoveryEngine, RowOp, SessionClose, SessionLedger, SessionStatus, SyncCounts, SyncResult,
    SyncServiceTrait, SyncSession,
};
use crate::errors::{AggregatorError, Error, Result, SyncError};
use crate::items::{Item, ItemPatch, ItemRef, ItemRepositoryTrait, ItemStatus};
use crate::transactions::{
    Transaction, TransactionPage, TransactionRecord, TransactionRepositoryTrait,
};

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Advisory-lock staleness window; older `in_progress` flags are treated
    /// as abandoned.
    pub staleness_window_secs: i64,
    /// Recovery attempts allowed per broken session.
    pub max_recovery_attempts: i32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            staleness_window_secs: SYNC_STALENESS_WINDOW_SECS,
            max_recovery_attempts: SYNC_MAX_RECOVERY_ATTEMPTS,
        }
    }
}

/// The sync engine's public service.
///
/// Per-item execution is logically single-threaded; the advisory lock bounds
/// (not eliminates) concurrent invocations, and the count-validation +
/// recovery loop absorbs the residual race rather than preventing it.
#[derive(Clone)]
pub struct SyncService {
    items: Arc<dyn ItemRepositoryTrait>,
    transactions: Arc<dyn TransactionRepositoryTrait>,
    gateway: Arc<dyn AggregatorGateway>,
    ledger: SessionLedger,
    recovery: RecoveryEngine,
    config: SyncConfig,
}

impl SyncService {
    pub fn new(
        items: Arc<dyn ItemRepositoryTrait>,
        transactions: Arc<dyn TransactionRepositoryTrait>,
        gateway: Arc<dyn AggregatorGateway>,
        ledger: SessionLedger,
        config: SyncConfig,
    ) -> Self {
        let recovery = RecoveryEngine::new(
            items.clone(),
            transactions.clone(),
            ledger.clone(),
            config.max_recovery_attempts,
        );
        Self {
            items,
            transactions,
            gateway,
            ledger,
            recovery,
            config,
        }
    }

    /// Normalize an item reference into a freshly-loaded record. Internal ids
    /// are tried first, then provider ids, so both forms are accepted at the
    /// boundary.
    fn resolve_item(&self, item_ref: &ItemRef) -> Result<Item> {
        let (item_id, user_id) = item_ref.key();
        if let Some(item) = self.items.get(item_id, user_id)? {
            return Ok(item);
        }
        self.items
            .get_by_provider_id(item_id, user_id)?
            .ok_or_else(|| Error::item_not_found(item_id))
    }

    /// Steps 2-9, run while holding the advisory lock. Any error out of here
    /// force-sets the item to `error` before propagating.
    async fn run_locked(&self, item: &Item) -> Result<SyncResult> {
        // Step 2: history lookup, including the one-time legacy-cursor
        // migration.
        let previous = self.load_previous_session(item).await?;

        // Step 3: recovery detour. The item pointer of record stays on the
        // last good session when a sync fails, so the failure is found
        // through the chain rather than the pointer.
        if let Some(broken) = self.find_broken_session(item, previous.as_ref())? {
            return self.run_recovery(item, &broken).await;
        }

        // Step 4: pre-fetch peek.
        let cursor = previous.as_ref().and_then(|s| s.next_cursor.clone());
        let (page, cursor) = self.fetch_page(item, cursor).await?;

        if page.is_empty() && !page.has_more {
            // Empty polls deliberately do not open a session; stamp the
            // previous one and release.
            if let Some(prev) = &previous {
                self.ledger.stamp_no_changes(&prev.id).await?;
            }
            self.items
                .update(
                    &item.id,
                    &item.user_id,
                    ItemPatch::status(ItemStatus::Complete).clear_error(),
                )
                .await?;
            debug!("Item {}: no upstream changes", item.id);
            return Ok(SyncResult {
                no_changes: true,
                cursor: cursor.clone(),
                next_cursor: cursor,
                ..SyncResult::default()
            });
        }

        // Step 5: open the session, expected counts asserted up front.
        let session = self
            .ledger
            .create_session(item, cursor.clone(), &page, previous.as_ref())
            .await?;

        // Step 6: apply the batch, row failures recorded rather than thrown.
        let added = apply_added(&self.transactions, item, &session, &page.added).await;
        let modified = apply_modified(&self.transactions, item, &session, &page.modified).await;
        let removed = apply_removed(&self.transactions, item, &page.removed).await;

        // Step 7: validate and close.
        let counts = SyncCounts {
            expected: session.sync_counts.expected,
            actual: CountSet::new(
                added.success_count,
                modified.success_count,
                removed.success_count,
            ),
        };
        let is_valid = counts_match(&counts);
        let sync_error = if is_valid {
            None
        } else {
            Some(SyncError::count_mismatch(format!(
                "session {}: expected {:?}, applied {:?}",
                session.id, counts.expected, counts.actual
            )))
        };
        let session = self
            .ledger
            .close_session(
                &session.id,
                SessionClose {
                    status: if is_valid {
                        SessionStatus::Complete
                    } else {
                        SessionStatus::Error
                    },
                    sync_counts: counts,
                    next_cursor: page.next_cursor.clone(),
                    has_more: page.has_more,
                    error: sync_error.clone(),
                    failed_transactions: FailedTransactions {
                        added: added.failed,
                        modified: modified.failed,
                        removed: removed.failed,
                    },
                },
            )
            .await?;

        // Step 8: release. The pointer of record advances only on success so
        // the next invocation's recovery check finds a failure via the chain.
        let release = match &sync_error {
            None => ItemPatch::status(ItemStatus::Complete)
                .with_sync_id(session.id.clone())
                .clear_error(),
            Some(err) => ItemPatch::status(ItemStatus::Error).with_error(err.clone()),
        };
        self.items.update(&item.id, &item.user_id, release).await?;

        // Step 9: structured result, inconsistency included as data.
        Ok(SyncResult {
            added: counts.actual.added.unwrap_or(0),
            modified: counts.actual.modified.unwrap_or(0),
            removed: counts.actual.removed.unwrap_or(0),
            has_more: page.has_more,
            no_changes: false,
            recovered: false,
            cursor,
            next_cursor: page.next_cursor,
            session_id: Some(session.id),
            error: sync_error,
            count_validation: Some(CountValidation { is_valid, counts }),
        })
    }

    /// Fetch one page, restarting once from the empty cursor when the
    /// provider rejects the stored one.
    async fn fetch_page(
        &self,
        item: &Item,
        cursor: Option<String>,
    ) -> Result<(TransactionPage, Option<String>)> {
        match self
            .gateway
            .fetch_page(&item.access_token, cursor.as_deref())
            .await
        {
            Ok(page) => Ok((page, cursor)),
            Err(Error::Aggregator(AggregatorError::InvalidCursor(msg))) if cursor.is_some() => {
                warn!(
                    "Provider rejected cursor for item {} ({}); restarting from empty cursor",
                    item.id, msg
                );
                let page = self.gateway.fetch_page(&item.access_token, None).await?;
                Ok((page, None))
            }
            Err(err) => Err(err),
        }
    }

    /// Session referenced by the item's pointer of record, synthesizing one
    /// from the legacy cursor format when the ledger has no history yet.
    async fn load_previous_session(&self, item: &Item) -> Result<Option<SyncSession>> {
        if let Some(sync_id) = &item.sync_id {
            return self.ledger.get_session(sync_id);
        }
        if item.cursor.is_some() {
            let session = self.ledger.synthesize_legacy_session(item).await?;
            self.items
                .update(
                    &item.id,
                    &item.user_id,
                    ItemPatch::default()
                        .with_sync_id(session.id.clone())
                        .clear_cursor(),
                )
                .await?;
            return Ok(Some(session));
        }
        Ok(None)
    }

    /// Walk the chain from the pointer of record looking for an untrustworthy
    /// session: the successor first (a failed sync leaves the pointer
    /// behind), then the pointed-at session itself (count mismatch can hide
    /// under a `complete` status).
    fn find_broken_session(
        &self,
        item: &Item,
        previous: Option<&SyncSession>,
    ) -> Result<Option<SyncSession>> {
        let Some(prev) = previous else {
            // No pointer of record yet: a failed *initial* sync is only
            // reachable through the item's session history.
            let latest = self.ledger.get_sessions_for_item(&item.id, Some(1))?;
            if let Some(latest) = latest.into_iter().next() {
                if session_is_broken(&latest) {
                    return Ok(Some(latest));
                }
            }
            return Ok(None);
        };
        if let Some(next_id) = &prev.next_session_id {
            if let Some(next) = self.ledger.get_session(next_id)? {
                if session_is_broken(&next) {
                    return Ok(Some(next));
                }
            }
        }
        if session_is_broken(prev) {
            return Ok(Some(prev.clone()));
        }
        Ok(None)
    }

    /// Run the compensation pass instead of a normal fetch for this
    /// invocation. The result reports `has_more: true` to force a fresh
    /// attempt next time rather than compounding a fetch into the same pass.
    async fn run_recovery(&self, item: &Item, broken: &SyncSession) -> Result<SyncResult> {
        warn!(
            "Item {} requires recovery: session {} is untrustworthy",
            item.id, broken.id
        );
        let recovery = self.recovery.recover(item, broken).await?;
        let recovered_ok = recovery.status == SessionStatus::Complete;

        let mut release = ItemPatch::status(if recovered_ok {
            ItemStatus::Complete
        } else {
            ItemStatus::Error
        });
        release = match &recovery.error {
            None => release.clear_error(),
            Some(err) => release.with_error(err.clone()),
        };
        self.items.update(&item.id, &item.user_id, release).await?;

        Ok(SyncResult {
            removed: recovery.sync_counts.actual.removed.unwrap_or(0),
            has_more: true,
            recovered: true,
            cursor: recovery.cursor.clone(),
            next_cursor: recovery.next_cursor.clone(),
            session_id: Some(recovery.id.clone()),
            error: recovery.error.clone(),
            count_validation: Some(CountValidation {
                is_valid: recovered_ok,
                counts: recovery.sync_counts,
            }),
            ..SyncResult::default()
        })
    }
}

fn session_is_broken(session: &SyncSession) -> bool {
    session.status == SessionStatus::Error || !counts_match(&session.sync_counts)
}

/// Remove and return the recorded failure for one provider transaction id,
/// searching all three buckets.
fn take_failed_entry(
    failed: &mut FailedTransactions,
    provider_transaction_id: &str,
) -> Option<FailedTransaction> {
    for bucket in [&mut failed.added, &mut failed.modified, &mut failed.removed] {
        if let Some(idx) = bucket
            .iter()
            .position(|f| f.provider_transaction_id == provider_transaction_id)
        {
            return Some(bucket.remove(idx));
        }
    }
    None
}

#[async_trait]
impl SyncServiceTrait for SyncService {
    async fn sync_transactions(&self, item_ref: ItemRef) -> Result<SyncResult> {
        let started = Instant::now();
        let item = self.resolve_item(&item_ref)?;

        // Step 1: advisory lock. Time-boxed, not transactional; a stale flag
        // is treated as an abandoned crash and overridden.
        if item.status == ItemStatus::InProgress {
            let age = Utc::now().signed_duration_since(item.updated_at);
            if age < Duration::seconds(self.config.staleness_window_secs) {
                return Err(Error::SyncInProgress(item.id));
            }
            warn!(
                "Item {} holds a stale in_progress lock ({}s old); overriding",
                item.id,
                age.num_seconds()
            );
        }
        let item = self
            .items
            .update(&item.id, &item.user_id, ItemPatch::status(ItemStatus::InProgress))
            .await?;

        match self.run_locked(&item).await {
            Ok(result) => {
                debug!(
                    "Sync for item {} finished in {:?} (added {}, modified {}, removed {}, has_more {})",
                    item.id,
                    started.elapsed(),
                    result.added,
                    result.modified,
                    result.removed,
                    result.has_more
                );
                Ok(result)
            }
            Err(err) => {
                error!("Sync for item {} failed: {}", item.id, err);
                let patch =
                    ItemPatch::status(ItemStatus::Error).with_error(SyncError::from(&err));
                if let Err(release_err) =
                    self.items.update(&item.id, &item.user_id, patch).await
                {
                    error!(
                        "Failed to mark item {} as errored after sync failure: {}",
                        item.id, release_err
                    );
                }
                Err(err)
            }
        }
    }

    async fn reapply_failed_transaction(
        &self,
        session_id: &str,
        provider_transaction_id: &str,
    ) -> Result<Option<Transaction>> {
        let session = self
            .ledger
            .get_session(session_id)?
            .ok_or_else(|| Error::invalid_input(format!("unknown session {}", session_id)))?;
        let item = self
            .items
            .get(&session.item_id, &session.user_id)?
            .ok_or_else(|| Error::item_not_found(session.item_id.clone()))?;

        let mut failed = session.failed_transactions.clone();
        let entry = take_failed_entry(&mut failed, provider_transaction_id).ok_or_else(|| {
            Error::invalid_input(format!(
                "no recorded failure for transaction {} on session {}",
                provider_transaction_id, session_id
            ))
        })?;

        let reapplied = match entry.op {
            RowOp::Added | RowOp::Modified => {
                let record: TransactionRecord = serde_json::from_value(entry.payload.clone())?;
                let row = Transaction::from_record(
                    &record,
                    &item,
                    session.cursor.as_deref(),
                    session.sync_time,
                );
                Some(self.transactions.upsert(row).await?)
            }
            RowOp::Removed => {
                self.transactions
                    .delete_by_provider_id(&session.user_id, provider_transaction_id)
                    .await?;
                None
            }
        };

        self.ledger
            .update_failed_transactions(session_id, failed)
            .await?;
        debug!(
            "Reapplied failed transaction {} from session {}",
            provider_transaction_id, session_id
        );
        Ok(reapplied)
    }

    fn get_sync_history(&self, item_id: &str, limit: Option<i64>) -> Result<Vec<SyncSession>> {
        self.ledger.get_sessions_for_item(item_id, limit)
    }
}
