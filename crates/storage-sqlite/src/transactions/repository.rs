//! SQLite repository for transactions.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;

use ledgerlink_core::errors::Result;
use ledgerlink_core::transactions::{Transaction, TransactionRepositoryTrait};

use super::model::TransactionDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::transactions;

pub struct TransactionRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl TransactionRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

fn find_by_provider_id(
    conn: &mut SqliteConnection,
    user_id_value: &str,
    provider_id: &str,
) -> Result<Option<Transaction>> {
    let row = transactions::table
        .filter(transactions::user_id.eq(user_id_value))
        .filter(transactions::provider_transaction_id.eq(provider_id))
        .first::<TransactionDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    row.map(TransactionDB::into_domain).transpose()
}

#[async_trait]
impl TransactionRepositoryTrait for TransactionRepository {
    fn get_by_provider_id(
        &self,
        user_id: &str,
        provider_transaction_id: &str,
    ) -> Result<Option<Transaction>> {
        let mut conn = get_connection(&self.pool)?;
        find_by_provider_id(&mut conn, user_id, provider_transaction_id)
    }

    fn find_synced_at_or_after(
        &self,
        item_id: &str,
        user_id: &str,
        sync_time: i64,
    ) -> Result<Vec<Transaction>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = transactions::table
            .filter(transactions::item_id.eq(item_id))
            .filter(transactions::user_id.eq(user_id))
            .filter(transactions::sync_time.ge(sync_time))
            .order(transactions::sync_time.asc())
            .load::<TransactionDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(TransactionDB::into_domain).collect()
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = transactions::table
            .filter(transactions::user_id.eq(user_id))
            .order(transactions::posted_at.desc())
            .load::<TransactionDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(TransactionDB::into_domain).collect()
    }

    async fn upsert(&self, transaction: Transaction) -> Result<Transaction> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Transaction> {
                // An existing row keeps its internal id and created_at; this
                // makes replay of the same page idempotent.
                let existing = find_by_provider_id(
                    conn,
                    &transaction.user_id,
                    &transaction.provider_transaction_id,
                )?;

                let merged = match existing {
                    Some(current) => Transaction {
                        id: current.id,
                        created_at: current.created_at,
                        ..transaction
                    },
                    None => transaction,
                };

                let row = TransactionDB::from_domain(&merged);
                diesel::insert_into(transactions::table)
                    .values(&row)
                    .on_conflict(transactions::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(merged)
            })
            .await
    }

    async fn delete_by_provider_id(
        &self,
        user_id: &str,
        provider_transaction_id: &str,
    ) -> Result<bool> {
        let user_id = user_id.to_string();
        let provider_id = provider_transaction_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let affected = diesel::delete(
                    transactions::table
                        .filter(transactions::user_id.eq(&user_id))
                        .filter(transactions::provider_transaction_id.eq(&provider_id)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(affected > 0)
            })
            .await
    }
}
