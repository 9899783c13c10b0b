//! Column encoding helpers shared by the repositories.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use bioquest_core::Result;

use crate::errors::StorageError;

/// Fixed-width UTC timestamps so text ordering matches time ordering.
pub(crate) fn ts_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn ts_from_db(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("timestamp '{}': {}", value, e)))?)
}

pub(crate) fn opt_ts_from_db(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(ts_from_db).transpose()
}

pub(crate) fn date_to_db(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_db(value: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| StorageError::Corrupt(format!("date '{}': {}", value, e)))?)
}

pub(crate) fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

pub(crate) fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}
