//! Database bootstrap: file placement, pooling, migrations, and the
//! serialized write actor.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ledgerlink_core::errors::{DatabaseError, Error, Result};

use crate::errors::StorageError;

pub mod write_actor;
pub use write_actor::{spawn_writer, WriteHandle};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const DB_FILE_NAME: &str = "ledgerlink.db";
const POOL_SIZE: u32 = 8;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const BUSY_TIMEOUT_MS: u32 = 5_000;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct ConnectionOptions;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON; \
             PRAGMA busy_timeout = {};",
            BUSY_TIMEOUT_MS
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Resolve the database path under `app_data_dir`, creating the directory if
/// needed. `:memory:` passes through untouched for tests.
pub fn init(app_data_dir: &str) -> Result<String> {
    if app_data_dir == ":memory:" {
        return Ok(app_data_dir.to_string());
    }

    let dir = Path::new(app_data_dir);
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::Database(DatabaseError::Internal(format!(
            "Failed to create data directory '{}': {}",
            app_data_dir, e
        )))
    })?;

    let db_path = dir.join(DB_FILE_NAME);
    Ok(db_path.to_string_lossy().to_string())
}

/// Run all pending embedded migrations against the database at `db_path`.
pub fn run_migrations(db_path: &str) -> Result<()> {
    let mut conn = SqliteConnection::establish(db_path).map_err(|e| {
        Error::Database(DatabaseError::Internal(format!(
            "Failed to open database '{}': {}",
            db_path, e
        )))
    })?;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::from(StorageError::Migration(e.to_string())))?;
    if !applied.is_empty() {
        info!("Applied {} database migration(s)", applied.len());
    }
    Ok(())
}

/// Build the shared read pool for the database at `db_path`.
pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .connection_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)
        .map_err(|e| {
            Error::Database(DatabaseError::Internal(format!(
                "Failed to create connection pool: {}",
                e
            )))
        })?;

    info!("SQLite pool ready at {}", db_path);
    Ok(Arc::new(pool))
}

/// Check out one pooled connection.
pub fn get_connection(pool: &Arc<DbPool>) -> Result<DbConnection> {
    pool.get().map_err(|e| {
        Error::Database(DatabaseError::Internal(format!(
            "Failed to get connection from pool: {}",
            e
        )))
    })
}
