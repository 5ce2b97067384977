//! Wire types for the provider's `/transactions/sync` endpoint.

use serde::{Deserialize, Serialize};

use ledgerlink_core::transactions::{RemovedTransaction, TransactionPage, TransactionRecord};

/// Provider error code meaning the item's credential must be re-linked.
pub const ERROR_CODE_LOGIN_REQUIRED: &str = "ITEM_LOGIN_REQUIRED";

/// Provider error code meaning the supplied cursor was rejected.
pub const ERROR_CODE_INVALID_CURSOR: &str = "INVALID_CURSOR";

/// Provider error code for rate limiting (alongside HTTP 429).
pub const ERROR_CODE_RATE_LIMIT: &str = "RATE_LIMIT_EXCEEDED";

/// Request body for one incremental sync page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsSyncRequest {
    pub client_id: String,
    pub secret: String,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Page size hint; the provider may return fewer rows.
    pub count: u32,
}

/// Response body for one incremental sync page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsSyncResponse {
    #[serde(default)]
    pub added: Vec<TransactionRecord>,
    #[serde(default)]
    pub modified: Vec<TransactionRecord>,
    #[serde(default)]
    pub removed: Vec<RemovedTransaction>,
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl TransactionsSyncResponse {
    pub fn into_page(self) -> TransactionPage {
        TransactionPage {
            added: self.added,
            modified: self.modified,
            removed: self.removed,
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}

/// Error body returned by the provider on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error_code: String,
    pub error_message: String,
    #[serde(default)]
    pub request_id: Option<String>,
}
