//! Repository contract for transaction persistence.

use async_trait::async_trait;

use super::Transaction;
use crate::errors::Result;

/// Trait for transaction store operations.
///
/// `upsert` matches on `(user_id, provider_transaction_id)`: an existing row
/// keeps its internal id and is overwritten in place, which is what makes the
/// add/modify paths idempotent under recovery replay.
#[async_trait]
pub trait TransactionRepositoryTrait: Send + Sync {
    fn get_by_provider_id(
        &self,
        user_id: &str,
        provider_transaction_id: &str,
    ) -> Result<Option<Transaction>>;

    /// Range scan used by the recovery sweep: every row for this item/user
    /// whose `sync_time` is at or after the boundary.
    fn find_synced_at_or_after(
        &self,
        item_id: &str,
        user_id: &str,
        sync_time: i64,
    ) -> Result<Vec<Transaction>>;

    fn list_for_user(&self, user_id: &str) -> Result<Vec<Transaction>>;

    async fn upsert(&self, transaction: Transaction) -> Result<Transaction>;

    /// Delete by provider id; returns whether a row was removed. Deleting an
    /// absent row is not an error.
    async fn delete_by_provider_id(
        &self,
        user_id: &str,
        provider_transaction_id: &str,
    ) -> Result<bool>;
}
