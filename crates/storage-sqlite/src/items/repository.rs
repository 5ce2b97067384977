//! SQLite repository for items.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;

use ledgerlink_core::errors::{DatabaseError, Error, Result};
use ledgerlink_core::items::{Item, ItemPatch, ItemRepositoryTrait};

use super::model::ItemDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::items;

pub struct ItemRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl ItemRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

fn load_item(
    conn: &mut SqliteConnection,
    item_id: &str,
    user_id_value: &str,
) -> Result<Option<Item>> {
    let row = items::table
        .find(item_id)
        .filter(items::user_id.eq(user_id_value))
        .first::<ItemDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    row.map(ItemDB::into_domain).transpose()
}

#[async_trait]
impl ItemRepositoryTrait for ItemRepository {
    fn get(&self, item_id: &str, user_id: &str) -> Result<Option<Item>> {
        let mut conn = get_connection(&self.pool)?;
        load_item(&mut conn, item_id, user_id)
    }

    fn get_by_provider_id(&self, provider_item_id: &str, user_id: &str) -> Result<Option<Item>> {
        let mut conn = get_connection(&self.pool)?;
        let row = items::table
            .filter(items::provider_item_id.eq(provider_item_id))
            .filter(items::user_id.eq(user_id))
            .first::<ItemDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(ItemDB::into_domain).transpose()
    }

    async fn insert(&self, item: Item) -> Result<Item> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Item> {
                let row = ItemDB::from_domain(&item)?;
                diesel::insert_into(items::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(item)
            })
            .await
    }

    async fn update(&self, item_id: &str, user_id: &str, patch: ItemPatch) -> Result<Item> {
        let item_id = item_id.to_string();
        let user_id = user_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Item> {
                let mut item = load_item(conn, &item_id, &user_id)?.ok_or_else(|| {
                    Error::Database(DatabaseError::NotFound(format!("item {}", item_id)))
                })?;
                patch.apply_to(&mut item);

                let row = ItemDB::from_domain(&item)?;
                diesel::update(items::table.find(&item_id))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(item)
            })
            .await
    }
}
