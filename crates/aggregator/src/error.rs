//! Error types for the aggregator client crate.

use thiserror::Error;

/// Result type alias for aggregator client operations.
pub type Result<T> = std::result::Result<T, AggregatorApiError>;

/// Retry policy class for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Errors that can occur talking to the provider API.
#[derive(Debug, Error)]
pub enum AggregatorApiError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from the provider API
    #[error("API error ({status}, {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AggregatorApiError {
    /// Create an API error from status, provider code, and message.
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Provider error code if this is an API error.
    pub fn provider_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> ApiRetryClass {
        match self {
            Self::Api { status, code, .. } => {
                if code == crate::types::ERROR_CODE_LOGIN_REQUIRED {
                    return ApiRetryClass::ReauthRequired;
                }
                match *status {
                    401 | 403 => ApiRetryClass::ReauthRequired,
                    408 | 425 | 429 => ApiRetryClass::Retryable,
                    500..=599 => ApiRetryClass::Retryable,
                    _ => ApiRetryClass::Permanent,
                }
            }
            Self::Http(err) => {
                if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
                    ApiRetryClass::Retryable
                } else {
                    ApiRetryClass::Permanent
                }
            }
            Self::Json(_) => ApiRetryClass::Permanent,
            Self::InvalidRequest(_) => ApiRetryClass::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_retryable() {
        let err = AggregatorApiError::api(429, "RATE_LIMIT_EXCEEDED", "slow down");
        assert_eq!(err.retry_class(), ApiRetryClass::Retryable);
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = AggregatorApiError::api(503, "INTERNAL_SERVER_ERROR", "unavailable");
        assert_eq!(err.retry_class(), ApiRetryClass::Retryable);
    }

    #[test]
    fn login_required_needs_reauth_regardless_of_status() {
        let err = AggregatorApiError::api(400, "ITEM_LOGIN_REQUIRED", "credentials expired");
        assert_eq!(err.retry_class(), ApiRetryClass::ReauthRequired);
    }

    #[test]
    fn invalid_cursor_is_permanent() {
        let err = AggregatorApiError::api(400, "INVALID_CURSOR", "cursor not recognized");
        assert_eq!(err.retry_class(), ApiRetryClass::Permanent);
        assert_eq!(err.provider_code(), Some("INVALID_CURSOR"));
    }
}
