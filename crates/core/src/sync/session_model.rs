//! Sync session domain models.
//!
//! A session is one durable record of a single attempt to advance an item's
//! cursor by one page. Sessions form a per-item, possibly-branching history:
//! chain pointers are session ids (arena style), never embedded records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SyncError;
use crate::transactions::TransactionPage;

/// Lifecycle status of a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Queued,
    InProgress,
    Complete,
    Error,
    /// An in-flight compensation session; terminal states are still
    /// `Complete`/`Error`.
    Recovery,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Added/modified/removed counts for one side of the ledger. `None` means
/// "not asserted" — recovery sessions only assert `removed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountSet {
    pub added: Option<i64>,
    pub modified: Option<i64>,
    pub removed: Option<i64>,
}

impl CountSet {
    pub fn new(added: i64, modified: i64, removed: i64) -> Self {
        Self {
            added: Some(added),
            modified: Some(modified),
            removed: Some(removed),
        }
    }

    /// The expected side for a fetched page.
    pub fn from_page(page: &TransactionPage) -> Self {
        Self::new(
            page.added.len() as i64,
            page.modified.len() as i64,
            page.removed.len() as i64,
        )
    }
}

/// The core correctness ledger: expected vs. actual counts for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCounts {
    pub expected: CountSet,
    pub actual: CountSet,
}

/// Which apply operation a row-level failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOp {
    Added,
    Modified,
    Removed,
}

/// One row-level apply failure, recorded with the full upstream payload so an
/// operator can re-apply it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTransaction {
    pub provider_transaction_id: String,
    pub op: RowOp,
    pub payload: serde_json::Value,
    pub error: String,
}

/// Per-operation buckets of row-level failures for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTransactions {
    pub added: Vec<FailedTransaction>,
    pub modified: Vec<FailedTransaction>,
    pub removed: Vec<FailedTransaction>,
}

impl FailedTransactions {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// One sync attempt for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSession {
    pub id: String,
    /// Internal item id.
    pub item_id: String,
    /// Provider-assigned item id, denormalized for indexing.
    pub provider_item_id: String,
    pub user_id: String,
    pub status: SessionStatus,
    /// Input cursor for this attempt (`None` = start of history).
    pub cursor: Option<String>,
    /// Output cursor when the attempt succeeded.
    pub next_cursor: Option<String>,
    pub prev_session_id: Option<String>,
    pub next_session_id: Option<String>,
    pub prev_successful_session_id: Option<String>,
    pub recovery_session_id: Option<String>,
    pub sync_counts: SyncCounts,
    pub has_more: bool,
    /// Strictly-increasing per-item logical clock for normal sessions.
    /// A recovery session shares the clock value of the session it
    /// compensates for, so a second recovery scans the same boundary.
    pub sync_time: i64,
    pub batch_number: i32,
    /// Groups the batches of one logical multi-page sync.
    pub sync_id: String,
    /// Branch-aware ordering: normal attempt `N`, its recoveries `N.1`,
    /// `N.2`, …
    pub sync_number: f64,
    pub is_recovery: bool,
    pub recovery_attempts: i32,
    pub error: Option<SyncError>,
    pub failed_transactions: FailedTransactions,
    pub last_no_changes_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncSession {
    /// A fresh in-progress session. Chain pointers, clock, and batch metadata
    /// are filled in by the session ledger.
    pub fn new(item_id: &str, provider_item_id: &str, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            item_id: item_id.to_string(),
            provider_item_id: provider_item_id.to_string(),
            user_id: user_id.to_string(),
            status: SessionStatus::InProgress,
            cursor: None,
            next_cursor: None,
            prev_session_id: None,
            next_session_id: None,
            prev_successful_session_id: None,
            recovery_session_id: None,
            sync_counts: SyncCounts::default(),
            has_more: false,
            sync_time: 1,
            batch_number: 1,
            sync_id: Uuid::new_v4().to_string(),
            sync_number: 1.0,
            is_recovery: false,
            recovery_attempts: 0,
            error: None,
            failed_transactions: FailedTransactions::default(),
            last_no_changes_time: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial-field merge applied by `SyncSessionRepositoryTrait::update`.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub next_cursor: Option<Option<String>>,
    pub next_session_id: Option<String>,
    pub recovery_session_id: Option<String>,
    pub sync_counts: Option<SyncCounts>,
    pub has_more: Option<bool>,
    pub recovery_attempts: Option<i32>,
    pub error: Option<Option<SyncError>>,
    pub failed_transactions: Option<FailedTransactions>,
    pub last_no_changes_time: Option<DateTime<Utc>>,
}

impl SessionPatch {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Merge this patch into a session in place, refreshing `updated_at`.
    pub fn apply_to(&self, session: &mut SyncSession) {
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(next_cursor) = &self.next_cursor {
            session.next_cursor = next_cursor.clone();
        }
        if let Some(next_session_id) = &self.next_session_id {
            session.next_session_id = Some(next_session_id.clone());
        }
        if let Some(recovery_session_id) = &self.recovery_session_id {
            session.recovery_session_id = Some(recovery_session_id.clone());
        }
        if let Some(sync_counts) = self.sync_counts {
            session.sync_counts = sync_counts;
        }
        if let Some(has_more) = self.has_more {
            session.has_more = has_more;
        }
        if let Some(recovery_attempts) = self.recovery_attempts {
            session.recovery_attempts = recovery_attempts;
        }
        if let Some(error) = &self.error {
            session.error = error.clone();
        }
        if let Some(failed) = &self.failed_transactions {
            session.failed_transactions = failed.clone();
        }
        if let Some(ts) = self.last_no_changes_time {
            session.last_no_changes_time = Some(ts);
        }
        session.updated_at = Utc::now();
    }
}

/// Count-validation verdict surfaced to callers alongside the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountValidation {
    pub is_valid: bool,
    pub counts: SyncCounts,
}

/// Outcome of one `sync_transactions` invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub added: i64,
    pub modified: i64,
    pub removed: i64,
    pub has_more: bool,
    /// True when the poll found no upstream changes and no session was
    /// created.
    pub no_changes: bool,
    /// True when this invocation ran recovery instead of a normal fetch.
    pub recovered: bool,
    pub cursor: Option<String>,
    pub next_cursor: Option<String>,
    pub session_id: Option<String>,
    /// Structured error for "ran but inconsistent" outcomes; the call itself
    /// did not throw.
    pub error: Option<SyncError>,
    pub count_validation: Option<CountValidation>,
}
