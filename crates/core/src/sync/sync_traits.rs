//! Traits defining the contracts for sync collaborators.

use async_trait::async_trait;

use super::{SessionPatch, SyncResult, SyncSession};
use crate::errors::Result;
use crate::items::ItemRef;
use crate::transactions::{Transaction, TransactionPage};

/// Trait for fetching one page of the provider's incremental change stream.
///
/// Implementations own retry/backoff for rate limits and transient transport
/// failures; errors that reach the caller are final for this invocation.
#[async_trait]
pub trait AggregatorGateway: Send + Sync {
    /// Fetch added/modified/removed records after `cursor` (`None` = start of
    /// history), together with the new cursor and a has-more flag.
    async fn fetch_page(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> Result<TransactionPage>;
}

/// Trait for sync session persistence.
///
/// Append-only by convention: rows are inserted once and patched, never
/// replaced or deleted.
#[async_trait]
pub trait SyncSessionRepositoryTrait: Send + Sync {
    fn get(&self, session_id: &str) -> Result<Option<SyncSession>>;

    /// Sessions for one item, newest first (by `sync_time`, then
    /// `sync_number` so recovery branches sort after the attempt they
    /// compensate for).
    fn get_for_item(&self, item_id: &str, limit: Option<i64>) -> Result<Vec<SyncSession>>;

    async fn insert(&self, session: SyncSession) -> Result<SyncSession>;
    async fn update(&self, session_id: &str, patch: SessionPatch) -> Result<SyncSession>;
}

/// Trait for the sync orchestrator's public surface.
#[async_trait]
pub trait SyncServiceTrait: Send + Sync {
    /// Run one fetch-apply-verify pass (or a recovery pass) for an item.
    async fn sync_transactions(&self, item_ref: ItemRef) -> Result<SyncResult>;

    /// Operator escape hatch: re-apply one recorded failed row from the
    /// payload stored on the session.
    async fn reapply_failed_transaction(
        &self,
        session_id: &str,
        provider_transaction_id: &str,
    ) -> Result<Option<Transaction>>;

    /// Read-only sync history for operator/UI inspection.
    fn get_sync_history(&self, item_id: &str, limit: Option<i64>) -> Result<Vec<SyncSession>>;
}
