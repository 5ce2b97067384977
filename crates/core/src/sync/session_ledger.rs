//! Session ledger: persistence and chain-pointer bookkeeping for sync
//! sessions.
//!
//! The ledger never decides whether a sync succeeded (the count validator
//! owns that) and never talks to the aggregator gateway.

use std::sync::Arc;

use chrono::Utc;
use log::debug;

use super::{
    CountSet, SessionPatch, SessionStatus, SyncCounts, SyncSession, SyncSessionRepositoryTrait,
};
use crate::errors::{Result, SyncError};
use crate::items::Item;
use crate::transactions::TransactionPage;

/// Terminal outcome applied when closing a session.
#[derive(Debug, Clone)]
pub struct SessionClose {
    pub status: SessionStatus,
    pub sync_counts: SyncCounts,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub error: Option<SyncError>,
    pub failed_transactions: super::FailedTransactions,
}

/// Service owning session creation, status transition, and count bookkeeping.
#[derive(Clone)]
pub struct SessionLedger {
    sessions: Arc<dyn SyncSessionRepositoryTrait>,
}

impl SessionLedger {
    pub fn new(sessions: Arc<dyn SyncSessionRepositoryTrait>) -> Self {
        Self { sessions }
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SyncSession>> {
        self.sessions.get(session_id)
    }

    /// Read-only history surface for operator/UI inspection.
    pub fn get_sessions_for_item(
        &self,
        item_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SyncSession>> {
        self.sessions.get_for_item(item_id, limit)
    }

    /// Open a new in-progress session for a fetched page, chained onto
    /// `previous`.
    ///
    /// The expected counts are asserted here, before any transaction is
    /// touched; the actual side stays unasserted until close so a crash
    /// mid-apply reads as a count mismatch.
    pub async fn create_session(
        &self,
        item: &Item,
        cursor: Option<String>,
        page: &TransactionPage,
        previous: Option<&SyncSession>,
    ) -> Result<SyncSession> {
        let mut session = SyncSession::new(&item.id, &item.provider_item_id, &item.user_id);
        session.cursor = cursor;
        session.sync_counts.expected = CountSet::from_page(page);

        if let Some(prev) = previous {
            session.sync_time = prev.sync_time + 1;
            session.sync_number = prev.sync_number.trunc() + 1.0;
            session.prev_session_id = Some(prev.id.clone());
            session.prev_successful_session_id = if prev.status == SessionStatus::Complete {
                Some(prev.id.clone())
            } else {
                prev.prev_successful_session_id.clone()
            };
            // A completed batch with more pages continues the same logical
            // sync; anything else starts a fresh one.
            if prev.status == SessionStatus::Complete && prev.has_more {
                session.sync_id = prev.sync_id.clone();
                session.batch_number = prev.batch_number + 1;
            }
        }

        debug!(
            "Opening sync session {} for item {} (sync_time={}, batch={})",
            session.id, item.id, session.sync_time, session.batch_number
        );

        let session = self.sessions.insert(session).await?;
        if let Some(prev) = previous {
            self.link_previous(&prev.id, &session.id).await?;
        }
        Ok(session)
    }

    /// Transition a session to its terminal state exactly once.
    pub async fn close_session(&self, session_id: &str, close: SessionClose) -> Result<SyncSession> {
        debug!("Closing sync session {} as {:?}", session_id, close.status);
        self.sessions
            .update(
                session_id,
                SessionPatch {
                    status: Some(close.status),
                    next_cursor: Some(close.next_cursor),
                    sync_counts: Some(close.sync_counts),
                    has_more: Some(close.has_more),
                    error: Some(close.error),
                    failed_transactions: Some(close.failed_transactions),
                    ..SessionPatch::default()
                },
            )
            .await
    }

    /// Record the forward pointer on the previous session.
    pub async fn link_previous(&self, prev_session_id: &str, new_session_id: &str) -> Result<()> {
        self.sessions
            .update(
                prev_session_id,
                SessionPatch {
                    next_session_id: Some(new_session_id.to_string()),
                    ..SessionPatch::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Open a recovery session compensating for `failed`.
    ///
    /// The expected removed count is asserted *before* the delete sweep runs,
    /// so a crash mid-delete is itself auditable and re-recoverable. The
    /// recovery session shares the failed session's `sync_time` (its branch
    /// is distinguished by the fractional `sync_number`), which keeps a
    /// second recovery scanning the same boundary.
    pub async fn create_recovery_session(
        &self,
        item: &Item,
        failed: &SyncSession,
        expected_removed: i64,
    ) -> Result<SyncSession> {
        let mut session = SyncSession::new(&item.id, &item.provider_item_id, &item.user_id);
        session.status = SessionStatus::Recovery;
        session.is_recovery = true;
        session.recovery_attempts = failed.recovery_attempts + 1;
        session.cursor = failed.cursor.clone();
        // Roll the output cursor back to the failed session's input so the
        // next normal pass re-fetches the same page.
        session.next_cursor = failed.cursor.clone();
        session.sync_time = failed.sync_time;
        session.sync_number =
            failed.sync_number.trunc() + f64::from(session.recovery_attempts) / 10.0;
        session.batch_number = failed.batch_number;
        session.sync_id = failed.sync_id.clone();
        session.prev_session_id = Some(failed.id.clone());
        session.prev_successful_session_id = failed.prev_successful_session_id.clone();
        session.sync_counts.expected.removed = Some(expected_removed);

        debug!(
            "Opening recovery session {} for failed session {} (attempt {}, sync_number {})",
            session.id, failed.id, session.recovery_attempts, session.sync_number
        );

        let session = self.sessions.insert(session).await?;
        // The attempt counter lives on the compensated session too, so a
        // later recovery of the same session sees how many have already run.
        self.sessions
            .update(
                &failed.id,
                SessionPatch {
                    recovery_session_id: Some(session.id.clone()),
                    recovery_attempts: Some(session.recovery_attempts),
                    ..SessionPatch::default()
                },
            )
            .await?;
        Ok(session)
    }

    /// Stamp an empty poll on the previous session instead of creating a new
    /// one, to avoid session-chain bloat.
    pub async fn stamp_no_changes(&self, session_id: &str) -> Result<SyncSession> {
        self.sessions
            .update(
                session_id,
                SessionPatch {
                    last_no_changes_time: Some(Utc::now()),
                    ..SessionPatch::default()
                },
            )
            .await
    }

    /// Replace a session's failure bucket after an operator remediation.
    pub async fn update_failed_transactions(
        &self,
        session_id: &str,
        failed: super::FailedTransactions,
    ) -> Result<SyncSession> {
        self.sessions
            .update(
                session_id,
                SessionPatch {
                    failed_transactions: Some(failed),
                    ..SessionPatch::default()
                },
            )
            .await
    }

    /// One-time migration: synthesize a completed session from an item's
    /// legacy pre-ledger cursor so downstream logic only ever sees the
    /// session shape.
    pub async fn synthesize_legacy_session(&self, item: &Item) -> Result<SyncSession> {
        let mut session = SyncSession::new(&item.id, &item.provider_item_id, &item.user_id);
        session.status = SessionStatus::Complete;
        session.next_cursor = item.cursor.clone();

        debug!(
            "Synthesizing legacy-cursor session {} for item {}",
            session.id, item.id
        );
        self.sessions.insert(session).await
    }
}
