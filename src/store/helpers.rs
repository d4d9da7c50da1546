use std::convert::TryFrom;

use chrono::{DateTime, Utc};

use crate::core::SessionError;

pub fn to_i64(value: u64) -> Result<i64, SessionError> {
    i64::try_from(value)
        .map_err(|_| SessionError::Store(format!("value {value} exceeds SQLite INTEGER range")))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64, SessionError> {
    u64::try_from(value)
        .map_err(|_| SessionError::Store(format!("{field} contains negative value {value}")))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>, SessionError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SessionError::Store(format!("failed to parse {field} '{value}': {e}")))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, SessionError> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}
