//! Database model for the transactions table.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use ledgerlink_core::errors::Result;
use ledgerlink_core::transactions::Transaction;

use crate::convert::{
    date_from_db, date_to_db, datetime_from_db, datetime_to_db, decimal_from_db, decimal_to_db,
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
#[diesel(table_name = crate::schema::transactions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TransactionDB {
    pub id: String,
    pub provider_transaction_id: String,
    pub item_id: String,
    pub user_id: String,
    pub account_id: String,
    /// Exact decimal text, never a float.
    pub amount: String,
    pub currency: String,
    pub posted_at: String,
    pub name: String,
    pub merchant_name: Option<String>,
    pub pending: i32,
    pub category: Option<String>,
    pub cursor: Option<String>,
    pub sync_time: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TransactionDB {
    pub fn from_domain(tx: &Transaction) -> Self {
        Self {
            id: tx.id.clone(),
            provider_transaction_id: tx.provider_transaction_id.clone(),
            item_id: tx.item_id.clone(),
            user_id: tx.user_id.clone(),
            account_id: tx.account_id.clone(),
            amount: decimal_to_db(&tx.amount),
            currency: tx.currency.clone(),
            posted_at: date_to_db(&tx.posted_at),
            name: tx.name.clone(),
            merchant_name: tx.merchant_name.clone(),
            pending: tx.pending as i32,
            category: tx.category.clone(),
            cursor: tx.cursor.clone(),
            sync_time: tx.sync_time,
            created_at: datetime_to_db(&tx.created_at),
            updated_at: datetime_to_db(&tx.updated_at),
        }
    }

    pub fn into_domain(self) -> Result<Transaction> {
        Ok(Transaction {
            amount: decimal_from_db(&self.amount)?,
            posted_at: date_from_db(&self.posted_at)?,
            created_at: datetime_from_db(&self.created_at)?,
            updated_at: datetime_from_db(&self.updated_at)?,
            id: self.id,
            provider_transaction_id: self.provider_transaction_id,
            item_id: self.item_id,
            user_id: self.user_id,
            account_id: self.account_id,
            currency: self.currency,
            name: self.name,
            merchant_name: self.merchant_name,
            pending: self.pending != 0,
            category: self.category,
            cursor: self.cursor,
            sync_time: self.sync_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlink_core::items::Item;
    use ledgerlink_core::transactions::TransactionRecord;
    use rust_decimal_macros::dec;

    #[test]
    fn transaction_round_trips_through_the_db_model() {
        let item = Item::new("provider-item-1", "user-1", "token");
        let record: TransactionRecord = serde_json::from_value(serde_json::json!({
            "transactionId": "tx-1",
            "accountId": "acct-1",
            "amount": 99.95,
            "date": "2026-02-14",
            "name": "HARDWARE STORE",
            "pending": true
        }))
        .unwrap();
        let tx = Transaction::from_record(&record, &item, Some("cursor-1"), 3);

        let row = TransactionDB::from_domain(&tx);
        assert_eq!(row.amount, "99.95");
        assert_eq!(row.pending, 1);

        let back = row.into_domain().unwrap();
        assert_eq!(back.amount, dec!(99.95));
        assert_eq!(back, tx);
    }
}
