//! Item domain models.
//!
//! An item is one linked bank connection belonging to a user. The provider
//! assigns the opaque `provider_item_id`; the natural key is
//! `(provider_item_id, user_id)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SyncError;

/// Sync lifecycle status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Queued,
    InProgress,
    Complete,
    Error,
}

/// One linked bank connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub provider_item_id: String,
    pub user_id: String,
    pub access_token: String,
    pub status: ItemStatus,
    /// Legacy pre-ledger cursor. Consumed once by the session-ledger
    /// migration; `None` afterwards.
    pub cursor: Option<String>,
    /// Id of the most recent *closed, successful* sync session. A failed
    /// session is recorded in the ledger but never referenced here.
    pub sync_id: Option<String>,
    pub error: Option<SyncError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Create a freshly linked item, queued for its initial sync.
    pub fn new(
        provider_item_id: impl Into<String>,
        user_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            provider_item_id: provider_item_id.into(),
            user_id: user_id.into(),
            access_token: access_token.into(),
            status: ItemStatus::Queued,
            cursor: None,
            sync_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial-field merge applied by `ItemRepositoryTrait::update`.
///
/// Outer `None` leaves the field untouched; for nullable fields the inner
/// `Option` carries the new value (`Some(None)` clears it).
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub status: Option<ItemStatus>,
    pub cursor: Option<Option<String>>,
    pub sync_id: Option<Option<String>>,
    pub error: Option<Option<SyncError>>,
}

impl ItemPatch {
    pub fn status(status: ItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_sync_id(mut self, sync_id: impl Into<String>) -> Self {
        self.sync_id = Some(Some(sync_id.into()));
        self
    }

    pub fn with_error(mut self, error: SyncError) -> Self {
        self.error = Some(Some(error));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub fn clear_cursor(mut self) -> Self {
        self.cursor = Some(None);
        self
    }

    /// Merge this patch into an item in place, refreshing `updated_at`.
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(cursor) = &self.cursor {
            item.cursor = cursor.clone();
        }
        if let Some(sync_id) = &self.sync_id {
            item.sync_id = sync_id.clone();
        }
        if let Some(error) = &self.error {
            item.error = error.clone();
        }
        item.updated_at = Utc::now();
    }
}

/// Caller-facing reference to an item: either the resolved record or the
/// `(item_id, user_id)` pair. The orchestrator normalizes both forms through
/// `resolve_item` before any core logic runs.
#[derive(Debug, Clone)]
pub enum ItemRef {
    Id { item_id: String, user_id: String },
    Item(Box<Item>),
}

impl ItemRef {
    pub fn id(item_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::Id {
            item_id: item_id.into(),
            user_id: user_id.into(),
        }
    }

    /// The `(item_id, user_id)` key regardless of form.
    pub fn key(&self) -> (&str, &str) {
        match self {
            Self::Id { item_id, user_id } => (item_id, user_id),
            Self::Item(item) => (&item.id, &item.user_id),
        }
    }
}

impl From<Item> for ItemRef {
    fn from(item: Item) -> Self {
        Self::Item(Box::new(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{SyncError, SyncErrorCode};

    #[test]
    fn patch_merges_only_set_fields() {
        let mut item = Item::new("provider-1", "user-1", "token");
        item.error = Some(SyncError::new(SyncErrorCode::Internal, "boom"));

        ItemPatch::status(ItemStatus::Complete)
            .with_sync_id("session-1")
            .clear_error()
            .apply_to(&mut item);

        assert_eq!(item.status, ItemStatus::Complete);
        assert_eq!(item.sync_id.as_deref(), Some("session-1"));
        assert!(item.error.is_none());
        // Untouched fields survive the merge.
        assert_eq!(item.provider_item_id, "provider-1");
        assert!(item.cursor.is_none());
    }

    #[test]
    fn item_ref_key_is_uniform_across_forms() {
        let item = Item::new("provider-1", "user-1", "token");
        let by_id = ItemRef::id(item.id.clone(), "user-1");
        let by_item = ItemRef::from(item.clone());

        assert_eq!(by_id.key(), (item.id.as_str(), "user-1"));
        assert_eq!(by_item.key(), (item.id.as_str(), "user-1"));
    }
}
