//! Database model for the items table.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use ledgerlink_core::errors::Result;
use ledgerlink_core::items::Item;

use crate::convert::{
    datetime_from_db, datetime_to_db, enum_from_db, enum_to_db, json_opt_from_db, json_opt_to_db,
};

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
#[diesel(table_name = crate::schema::items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ItemDB {
    pub id: String,
    pub provider_item_id: String,
    pub user_id: String,
    pub access_token: String,
    pub status: String,
    pub cursor: Option<String>,
    pub sync_id: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ItemDB {
    pub fn from_domain(item: &Item) -> Result<Self> {
        Ok(Self {
            id: item.id.clone(),
            provider_item_id: item.provider_item_id.clone(),
            user_id: item.user_id.clone(),
            access_token: item.access_token.clone(),
            status: enum_to_db(&item.status)?,
            cursor: item.cursor.clone(),
            sync_id: item.sync_id.clone(),
            error: json_opt_to_db(&item.error)?,
            created_at: datetime_to_db(&item.created_at),
            updated_at: datetime_to_db(&item.updated_at),
        })
    }

    pub fn into_domain(self) -> Result<Item> {
        Ok(Item {
            status: enum_from_db(&self.status)?,
            error: json_opt_from_db(&self.error)?,
            created_at: datetime_from_db(&self.created_at)?,
            updated_at: datetime_from_db(&self.updated_at)?,
            id: self.id,
            provider_item_id: self.provider_item_id,
            user_id: self.user_id,
            access_token: self.access_token,
            cursor: self.cursor,
            sync_id: self.sync_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlink_core::errors::{SyncError, SyncErrorCode};
    use ledgerlink_core::items::ItemStatus;

    #[test]
    fn item_round_trips_through_the_db_model() {
        let mut item = Item::new("provider-item-1", "user-1", "token");
        item.status = ItemStatus::Error;
        item.cursor = Some("legacy-cursor".to_string());
        item.error = Some(SyncError::new(SyncErrorCode::Internal, "boom"));

        let row = ItemDB::from_domain(&item).unwrap();
        assert_eq!(row.status, "error");

        let back = row.into_domain().unwrap();
        assert_eq!(back, item);
    }
}
