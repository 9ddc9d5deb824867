use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::CoreError;
use crate::models::table::TimeSeriesTable;

/// Date keys are written as midnight timestamps, e.g. `2025-01-15T00:00:00.000`.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%dT00:00:00.000";

/// Serialize a table as `{ column: { date: value } }`.
///
/// Columns and dates are sorted and the output is indented with four spaces,
/// so consecutive cache files diff cleanly.
pub fn encode(table: &TimeSeriesTable) -> Result<Vec<u8>, CoreError> {
    let mut doc: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for name in table.column_names() {
        let cells = table
            .column(&name)
            .map(|cells| {
                cells
                    .iter()
                    .map(|(date, value)| (date.format(DATE_KEY_FORMAT).to_string(), *value))
                    .collect()
            })
            .unwrap_or_default();
        doc.insert(name, cells);
    }

    to_pretty_json(&doc)
}

/// Four-space indented JSON with a trailing newline. Map keys come out in
/// the order the value iterates them (sorted for `BTreeMap` and `Value`).
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize JSON document: {e}")))?;
    buf.push(b'\n');
    Ok(buf)
}

/// Parse a `{ column: { date: value } }` document back into a table.
///
/// `null` cells are treated as absent. Every date key must parse; a single bad
/// key rejects the whole document.
pub fn decode(bytes: &[u8]) -> Result<TimeSeriesTable, CoreError> {
    let doc: BTreeMap<String, BTreeMap<String, Option<f64>>> = serde_json::from_slice(bytes)
        .map_err(|e| CoreError::Deserialization(format!("Invalid cache document: {e}")))?;

    let mut table = TimeSeriesTable::new();
    for (column, cells) in doc {
        table.add_column(&column);
        for (key, value) in cells {
            let date = parse_date_key(&key).ok_or_else(|| {
                CoreError::Deserialization(format!("Invalid date key '{key}' in column {column}"))
            })?;
            match value {
                Some(v) => table.set(&column, date, v),
                None => table.add_row(date),
            }
        }
    }
    Ok(table)
}

/// Accepts plain dates, naive date-times, RFC 3339 timestamps and epoch
/// milliseconds; all normalise to the calendar date.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    let key = key.trim();
    if let Ok(date) = NaiveDate::parse_from_str(key, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(key, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(key) {
        return Some(dt.date_naive());
    }
    if let Ok(millis) = key.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive());
    }
    None
}
