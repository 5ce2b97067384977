//! Repository contract for item persistence.

use async_trait::async_trait;

use super::{Item, ItemPatch};
use crate::errors::Result;

/// Trait for item store operations.
///
/// `update` is a partial-field merge, not a full overwrite; implementations
/// must refresh `updated_at` on every merge since the advisory lock's
/// staleness check reads it.
#[async_trait]
pub trait ItemRepositoryTrait: Send + Sync {
    fn get(&self, item_id: &str, user_id: &str) -> Result<Option<Item>>;
    fn get_by_provider_id(&self, provider_item_id: &str, user_id: &str) -> Result<Option<Item>>;
    async fn insert(&self, item: Item) -> Result<Item>;
    async fn update(&self, item_id: &str, user_id: &str, patch: ItemPatch) -> Result<Item>;
}
