//! Database model for the sync_sessions table.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use ledgerlink_core::errors::Result;
use ledgerlink_core::sync::SyncSession;

use crate::convert::{
    datetime_from_db, datetime_to_db, enum_from_db, enum_to_db, json_opt_from_db, json_opt_to_db,
};
use crate::errors::StorageError;

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncSessionDB {
    pub id: String,
    pub item_id: String,
    pub provider_item_id: String,
    pub user_id: String,
    pub status: String,
    pub cursor: Option<String>,
    pub next_cursor: Option<String>,
    pub prev_session_id: Option<String>,
    pub next_session_id: Option<String>,
    pub prev_successful_session_id: Option<String>,
    pub recovery_session_id: Option<String>,
    /// JSON-encoded expected/actual count pairs.
    pub sync_counts: String,
    pub has_more: i32,
    pub sync_time: i64,
    pub batch_number: i32,
    pub sync_id: String,
    pub sync_number: f64,
    pub is_recovery: i32,
    pub recovery_attempts: i32,
    pub error: Option<String>,
    /// JSON-encoded per-operation failure buckets.
    pub failed_transactions: String,
    pub last_no_changes_time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl SyncSessionDB {
    pub fn from_domain(session: &SyncSession) -> Result<Self> {
        Ok(Self {
            id: session.id.clone(),
            item_id: session.item_id.clone(),
            provider_item_id: session.provider_item_id.clone(),
            user_id: session.user_id.clone(),
            status: enum_to_db(&session.status)?,
            cursor: session.cursor.clone(),
            next_cursor: session.next_cursor.clone(),
            prev_session_id: session.prev_session_id.clone(),
            next_session_id: session.next_session_id.clone(),
            prev_successful_session_id: session.prev_successful_session_id.clone(),
            recovery_session_id: session.recovery_session_id.clone(),
            sync_counts: serde_json::to_string(&session.sync_counts)?,
            has_more: session.has_more as i32,
            sync_time: session.sync_time,
            batch_number: session.batch_number,
            sync_id: session.sync_id.clone(),
            sync_number: session.sync_number,
            is_recovery: session.is_recovery as i32,
            recovery_attempts: session.recovery_attempts,
            error: json_opt_to_db(&session.error)?,
            failed_transactions: serde_json::to_string(&session.failed_transactions)?,
            last_no_changes_time: session.last_no_changes_time.as_ref().map(datetime_to_db),
            created_at: datetime_to_db(&session.created_at),
            updated_at: datetime_to_db(&session.updated_at),
        })
    }

    pub fn into_domain(self) -> Result<SyncSession> {
        Ok(SyncSession {
            status: enum_from_db(&self.status)?,
            sync_counts: serde_json::from_str(&self.sync_counts).map_err(|e| {
                StorageError::corrupt(format!("bad sync_counts for session {}: {}", self.id, e))
            })?,
            failed_transactions: serde_json::from_str(&self.failed_transactions).map_err(|e| {
                StorageError::corrupt(format!(
                    "bad failed_transactions for session {}: {}",
                    self.id, e
                ))
            })?,
            error: json_opt_from_db(&self.error)?,
            last_no_changes_time: self
                .last_no_changes_time
                .as_deref()
                .map(datetime_from_db)
                .transpose()?,
            created_at: datetime_from_db(&self.created_at)?,
            updated_at: datetime_from_db(&self.updated_at)?,
            id: self.id,
            item_id: self.item_id,
            provider_item_id: self.provider_item_id,
            user_id: self.user_id,
            cursor: self.cursor,
            next_cursor: self.next_cursor,
            prev_session_id: self.prev_session_id,
            next_session_id: self.next_session_id,
            prev_successful_session_id: self.prev_successful_session_id,
            recovery_session_id: self.recovery_session_id,
            has_more: self.has_more != 0,
            sync_time: self.sync_time,
            batch_number: self.batch_number,
            sync_id: self.sync_id,
            sync_number: self.sync_number,
            is_recovery: self.is_recovery != 0,
            recovery_attempts: self.recovery_attempts,
        })
    }
}
