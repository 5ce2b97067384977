//! Storage-layer error type and its mapping into the core error model.

use ledgerlink_core::errors::{DatabaseError, Error};
use thiserror::Error;

/// Errors raised inside the SQLite storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database query failed: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Stored value is corrupt: {0}")]
    Corrupt(String),

    #[error("Write queue unavailable: {0}")]
    WriterUnavailable(String),
}

impl StorageError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Diesel(diesel::result::Error::NotFound) => {
                Error::Database(DatabaseError::NotFound("record not found".to_string()))
            }
            StorageError::Diesel(e) => Error::Database(DatabaseError::QueryFailed(e.to_string())),
            other => Error::Database(DatabaseError::Internal(other.to_string())),
        }
    }
}
