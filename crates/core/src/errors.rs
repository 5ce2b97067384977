//! Error types shared across the LedgerLink crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that propagate to the immediate caller of a sync operation.
///
/// Row-level apply failures and session-level count mismatches are *not*
/// represented here; they are recorded as [`SyncError`] data on sessions and
/// results instead of being thrown.
#[derive(Debug, Error)]
pub enum Error {
    /// No item exists for the given id/user pair.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Advisory-lock contention: another sync for this item is recent.
    #[error("Sync already in progress for item {0}")]
    SyncInProgress(String),

    /// Recovery could not run (attempt cap breached or sweep aborted).
    #[error("Recovery failed: {0}")]
    RecoveryFailed(String),

    /// Malformed caller input (bad ids, missing payloads, etc.).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upstream provider error surfaced by the aggregator gateway.
    #[error("Aggregator error: {0}")]
    Aggregator(#[from] AggregatorError),

    /// Persistence error surfaced by a repository.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors originating from the upstream financial-data provider.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// The provider rejected the cursor; the caller restarts from empty.
    #[error("Provider rejected sync cursor: {0}")]
    InvalidCursor(String),

    /// The item's credential is no longer valid; requires user action.
    #[error("Item requires re-authentication: {0}")]
    LoginRequired(String),

    /// Rate limit budget exhausted after retries.
    #[error("Provider rate limit exhausted: {0}")]
    RateLimited(String),

    /// Transport failure (connect, timeout, reset) after retries.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other provider API error, carrying the provider's error code.
    #[error("Provider API error ({code}): {message}")]
    Api { code: String, message: String },
}

/// Persistence-layer errors, constructed by storage implementations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Machine-readable codes for structured sync errors carried as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncErrorCode {
    ItemNotFound,
    SyncInProgress,
    InvalidCursor,
    CountMismatch,
    RecoveryFailed,
    ItemLoginRequired,
    RateLimited,
    Internal,
}

/// Structured, serializable error payload stored on items, sessions, and
/// results. This is data, not a thrown error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncError {
    pub code: SyncErrorCode,
    pub message: String,
}

impl SyncError {
    pub fn new(code: SyncErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn count_mismatch(message: impl Into<String>) -> Self {
        Self::new(SyncErrorCode::CountMismatch, message)
    }

    pub fn recovery_failed(message: impl Into<String>) -> Self {
        Self::new(SyncErrorCode::RecoveryFailed, message)
    }
}

impl From<&Error> for SyncError {
    fn from(err: &Error) -> Self {
        let code = match err {
            Error::ItemNotFound(_) => SyncErrorCode::ItemNotFound,
            Error::SyncInProgress(_) => SyncErrorCode::SyncInProgress,
            Error::RecoveryFailed(_) => SyncErrorCode::RecoveryFailed,
            Error::Aggregator(AggregatorError::InvalidCursor(_)) => SyncErrorCode::InvalidCursor,
            Error::Aggregator(AggregatorError::LoginRequired(_)) => {
                SyncErrorCode::ItemLoginRequired
            }
            Error::Aggregator(AggregatorError::RateLimited(_)) => SyncErrorCode::RateLimited,
            _ => SyncErrorCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

impl Error {
    pub fn item_not_found(item_id: impl Into<String>) -> Self {
        Self::ItemNotFound(item_id.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// True when the error requires user re-authentication and must not be
    /// auto-retried by this engine.
    pub fn is_login_required(&self) -> bool {
        matches!(self, Self::Aggregator(AggregatorError::LoginRequired(_)))
    }
}
