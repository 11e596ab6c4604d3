//! Row-to-entity parsing helpers.
//!
//! These helpers isolate column parsing and handle the dual datetime format
//! (`SQLite`'s `datetime('now')` vs Rust's `to_rfc3339()`).

use chrono::{DateTime, Utc};
use lum_core::entities::MigrationOrigin;

use crate::error::DatabaseError;

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// Handles both RFC 3339 (`"2026-02-09T14:30:00+00:00"`) and `SQLite`'s default
/// format (`"2026-02-09 14:30:00"`).
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string cannot be parsed as either format.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Parse an optional TEXT column as `Option<DateTime<Utc>>`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if a non-empty string cannot be parsed.
pub fn parse_optional_datetime(s: Option<&str>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    match s {
        Some(s) if !s.is_empty() => Ok(Some(parse_datetime(s)?)),
        _ => Ok(None),
    }
}

/// Parse a TEXT column into a serde-deserializable enum.
///
/// Works with all lum-core enums that use `#[serde(rename_all = "snake_case")]`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string does not match any enum variant.
pub fn parse_enum<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| DatabaseError::Query(format!("Failed to parse enum from '{s}': {e}")))
}

/// Read a nullable TEXT column. Returns `None` for both SQL NULL and empty string.
///
/// `row.get::<String>(idx)` on a NULL column returns an error, not `""`.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_opt_string(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    match row.get::<Option<String>>(idx)? {
        Some(s) if s.is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Read a non-negative INTEGER column as `u32`.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` for negative or oversized values.
pub fn get_u32(row: &libsql::Row, idx: i32) -> Result<u32, DatabaseError> {
    let value = row.get::<i64>(idx)?;
    u32::try_from(value)
        .map_err(|_| DatabaseError::InvalidState(format!("column {idx} out of range: {value}")))
}

/// Read an INTEGER column as a boolean (`0` is false).
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_bool(row: &libsql::Row, idx: i32) -> Result<bool, DatabaseError> {
    Ok(row.get::<i64>(idx)? != 0)
}

/// Parse a JSON TEXT column into `T`.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` if the JSON does not decode.
pub fn parse_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(s)
        .map_err(|e| DatabaseError::InvalidState(format!("Invalid JSON in column: {e}")))
}

/// Read the three origin columns starting at `idx`.
///
/// The origin is present only when the guest id column is set.
///
/// # Errors
///
/// Returns `DatabaseError` if a column read or datetime parse fails.
pub fn get_origin(row: &libsql::Row, idx: i32) -> Result<Option<MigrationOrigin>, DatabaseError> {
    let Some(source_guest_id) = get_opt_string(row, idx)? else {
        return Ok(None);
    };
    let session_id = get_opt_string(row, idx + 1)?.unwrap_or_default();
    let migrated_at = get_opt_string(row, idx + 2)?
        .ok_or_else(|| DatabaseError::InvalidState("origin without migrated_at".into()))?;
    Ok(Some(MigrationOrigin {
        source_guest_id,
        session_id,
        migrated_at: parse_datetime(&migrated_at)?,
    }))
}

/// Split an origin into the three nullable column values.
#[must_use]
pub fn origin_columns(
    origin: Option<&MigrationOrigin>,
) -> (Option<String>, Option<String>, Option<String>) {
    origin.map_or((None, None, None), |o| {
        (
            Some(o.source_guest_id.clone()),
            Some(o.session_id.clone()),
            Some(o.migrated_at.to_rfc3339()),
        )
    })
}

/// Format an optional timestamp for a nullable TEXT column.
#[must_use]
pub fn opt_rfc3339(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(|d| d.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lum_core::enums::Difficulty;

    #[test]
    fn parses_both_datetime_formats() {
        let a = parse_datetime("2026-02-09T14:30:00+00:00").unwrap();
        let b = parse_datetime("2026-02-09 14:30:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn empty_optional_datetime_is_none() {
        assert_eq!(parse_optional_datetime(Some("")).unwrap(), None);
        assert_eq!(parse_optional_datetime(None).unwrap(), None);
    }

    #[test]
    fn enums_parse_from_snake_case() {
        let d: Difficulty = parse_enum("hard").unwrap();
        assert_eq!(d, Difficulty::Hard);
        assert!(parse_enum::<Difficulty>("extreme").is_err());
    }
}
