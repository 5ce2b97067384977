//! Transaction domain models and the wire shapes of one aggregator page.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::items::Item;

/// One stored financial transaction row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    /// Provider-assigned id, unique within a user.
    pub provider_transaction_id: String,
    pub item_id: String,
    pub user_id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub posted_at: NaiveDate,
    pub name: String,
    pub merchant_name: Option<String>,
    pub pending: bool,
    pub category: Option<String>,
    /// Input cursor of the session that last touched this row.
    pub cursor: Option<String>,
    /// Logical clock of the session that last touched this row. The recovery
    /// sweep scans `sync_time >= boundary` on this field.
    pub sync_time: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a row from an upstream record, stamping sync provenance.
    pub fn from_record(
        record: &TransactionRecord,
        item: &Item,
        cursor: Option<&str>,
        sync_time: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            provider_transaction_id: record.transaction_id.clone(),
            item_id: item.id.clone(),
            user_id: item.user_id.clone(),
            account_id: record.account_id.clone(),
            amount: record.amount,
            currency: record.currency.clone(),
            posted_at: record.date,
            name: record.name.clone(),
            merchant_name: record.merchant_name.clone(),
            pending: record.pending,
            category: record.category.clone(),
            cursor: cursor.map(str::to_string),
            sync_time,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One added/modified transaction as delivered by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub account_id: String,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// One removed transaction reference as delivered by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedTransaction {
    pub transaction_id: String,
}

/// One page of the provider's incremental change stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub added: Vec<TransactionRecord>,
    pub modified: Vec<TransactionRecord>,
    pub removed: Vec<RemovedTransaction>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl TransactionPage {
    /// True when the page carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}
