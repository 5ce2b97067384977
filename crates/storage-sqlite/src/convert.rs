//! Shared conversions between domain values and their TEXT column encodings.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use ledgerlink_core::errors::Result;

use crate::errors::StorageError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Serialize a serde unit-variant enum to its bare string form.
pub fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

/// Parse a bare enum string back into its serde unit-variant form.
pub fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

pub fn datetime_to_db(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub fn datetime_from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::corrupt(format!("bad timestamp '{}': {}", value, e)).into())
}

pub fn date_to_db(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn date_from_db(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| StorageError::corrupt(format!("bad date '{}': {}", value, e)).into())
}

pub fn decimal_to_db(value: &Decimal) -> String {
    value.to_string()
}

pub fn decimal_from_db(value: &str) -> Result<Decimal> {
    value
        .parse::<Decimal>()
        .map_err(|e| StorageError::corrupt(format!("bad amount '{}': {}", value, e)).into())
}

/// Serialize an optional JSON-backed column value.
pub fn json_opt_to_db<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(ledgerlink_core::Error::from))
        .transpose()
}

/// Parse an optional JSON-backed column value.
pub fn json_opt_from_db<T: serde::de::DeserializeOwned>(value: &Option<String>) -> Result<Option<T>> {
    value
        .as_ref()
        .map(|v| serde_json::from_str(v).map_err(ledgerlink_core::Error::from))
        .transpose()
}
