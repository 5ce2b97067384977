//! HTTP client for the provider's incremental transactions-sync API.

use log::debug;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;
use tokio::time::sleep;

use async_trait::async_trait;
use ledgerlink_core::errors::AggregatorError;
use ledgerlink_core::sync::AggregatorGateway;
use ledgerlink_core::transactions::TransactionPage;

use crate::error::{AggregatorApiError, ApiRetryClass, Result};
use crate::types::*;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;
const DEFAULT_PAGE_SIZE: u32 = 500;
const FETCH_MAX_ATTEMPTS: usize = 5;
const FETCH_BASE_BACKOFF_MS: u64 = 250;
const FETCH_MAX_BACKOFF_MS: u64 = 8_000;

fn fetch_backoff_with_jitter(attempt: usize) -> Duration {
    let exp = (attempt.saturating_sub(1) as u32).min(8);
    let backoff =
        (FETCH_BASE_BACKOFF_MS.saturating_mul(1_u64 << exp)).min(FETCH_MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
    Duration::from_millis(backoff.saturating_add(jitter))
}

/// Client for the provider's transactions-sync REST API.
#[derive(Debug, Clone)]
pub struct AggregatorClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    secret: String,
    page_size: u32,
}

impl AggregatorClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the provider API
    /// * `client_id` / `secret` - API credentials sent in each request body
    pub fn new(base_url: &str, client_id: &str, secret: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            secret: secret.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the page size hint sent with each request.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(AggregatorApiError::api(
                    status.as_u16(),
                    error.error_code,
                    error.error_message,
                ));
            }
            return Err(AggregatorApiError::api(
                status.as_u16(),
                "UNKNOWN",
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            AggregatorApiError::Json(e)
        })
    }

    /// Issue one `/transactions/sync` request without retries.
    ///
    /// POST /transactions/sync
    pub async fn sync_transactions_once(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> Result<TransactionsSyncResponse> {
        if access_token.trim().is_empty() {
            return Err(AggregatorApiError::invalid_request("Missing access token"));
        }

        let url = format!("{}/transactions/sync", self.base_url);
        let request = TransactionsSyncRequest {
            client_id: self.client_id.clone(),
            secret: self.secret.clone(),
            access_token: access_token.to_string(),
            cursor: cursor.map(|c| c.to_string()),
            count: self.page_size,
        };

        let response = self
            .client
            .post(&url)
            .headers(Self::headers())
            .json(&request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch one page, retrying transient failures with backoff and jitter.
    async fn sync_transactions_with_retry(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> Result<TransactionsSyncResponse> {
        let mut attempt = 0usize;

        loop {
            attempt = attempt.saturating_add(1);
            match self.sync_transactions_once(access_token, cursor).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if err.retry_class() == ApiRetryClass::Retryable
                        && attempt < FETCH_MAX_ATTEMPTS
                    {
                        let backoff = fetch_backoff_with_jitter(attempt);
                        debug!(
                            "Transactions sync retry attempt {}/{} after error: {}",
                            attempt + 1,
                            FETCH_MAX_ATTEMPTS,
                            err
                        );
                        sleep(backoff).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// Translate a final client error into the domain-level provider error.
fn map_provider_error(err: AggregatorApiError) -> AggregatorError {
    match &err {
        AggregatorApiError::Api {
            status,
            code,
            message,
        } => match code.as_str() {
            ERROR_CODE_INVALID_CURSOR => AggregatorError::InvalidCursor(message.clone()),
            ERROR_CODE_LOGIN_REQUIRED => AggregatorError::LoginRequired(message.clone()),
            ERROR_CODE_RATE_LIMIT => AggregatorError::RateLimited(message.clone()),
            _ if *status == 429 => AggregatorError::RateLimited(message.clone()),
            _ => AggregatorError::Api {
                code: code.clone(),
                message: message.clone(),
            },
        },
        AggregatorApiError::Http(_) => AggregatorError::Transport(err.to_string()),
        _ => AggregatorError::Api {
            code: "CLIENT_ERROR".to_string(),
            message: err.to_string(),
        },
    }
}

#[async_trait]
impl AggregatorGateway for AggregatorClient {
    async fn fetch_page(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> ledgerlink_core::Result<TransactionPage> {
        let response = self
            .sync_transactions_with_retry(access_token, cursor)
            .await
            .map_err(|err| ledgerlink_core::Error::from(map_provider_error(err)))?;

        Ok(response.into_page())
    }
}
