//! SQLite repository for sync sessions.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;

use ledgerlink_core::errors::{DatabaseError, Error, Result};
use ledgerlink_core::sync::{SessionPatch, SyncSession, SyncSessionRepositoryTrait};

use super::model::SyncSessionDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sync_sessions;

pub struct SyncSessionRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SyncSessionRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

fn load_session(conn: &mut SqliteConnection, session_id: &str) -> Result<Option<SyncSession>> {
    let row = sync_sessions::table
        .find(session_id)
        .first::<SyncSessionDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    row.map(SyncSessionDB::into_domain).transpose()
}

#[async_trait]
impl SyncSessionRepositoryTrait for SyncSessionRepository {
    fn get(&self, session_id: &str) -> Result<Option<SyncSession>> {
        let mut conn = get_connection(&self.pool)?;
        load_session(&mut conn, session_id)
    }

    fn get_for_item(&self, item_id: &str, limit: Option<i64>) -> Result<Vec<SyncSession>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = sync_sessions::table
            .filter(sync_sessions::item_id.eq(item_id))
            .order((
                sync_sessions::sync_time.desc(),
                sync_sessions::sync_number.desc(),
            ))
            .into_boxed();
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let rows = query
            .load::<SyncSessionDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(SyncSessionDB::into_domain).collect()
    }

    async fn insert(&self, session: SyncSession) -> Result<SyncSession> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SyncSession> {
                let row = SyncSessionDB::from_domain(&session)?;
                diesel::insert_into(sync_sessions::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(session)
            })
            .await
    }

    async fn update(&self, session_id: &str, patch: SessionPatch) -> Result<SyncSession> {
        let session_id = session_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SyncSession> {
                let mut session = load_session(conn, &session_id)?.ok_or_else(|| {
                    Error::Database(DatabaseError::NotFound(format!("session {}", session_id)))
                })?;
                patch.apply_to(&mut session);

                let row = SyncSessionDB::from_domain(&session)?;
                diesel::update(sync_sessions::table.find(&session_id))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(session)
            })
            .await
    }
}
