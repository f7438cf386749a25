//! Loose value coercions for scraper output, where numbers arrive as strings
//! and timestamps arrive in several encodings.
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::record::RawRecord;

/// Epoch values above this are interpreted as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

pub(super) fn first_string(raw: &RawRecord, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| raw.get(alias))
        .find_map(value_as_string)
}

pub(super) fn first_count(raw: &RawRecord, aliases: &[&str]) -> u64 {
    aliases
        .iter()
        .filter_map(|alias| raw.get(alias))
        .find_map(value_as_count)
        .unwrap_or(0)
}

pub(super) fn first_timestamp(raw: &RawRecord, aliases: &[&str]) -> Option<DateTime<Utc>> {
    aliases
        .iter()
        .filter_map(|alias| raw.get(alias))
        .find_map(value_as_timestamp)
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn value_as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_i64().map(|n| u64::try_from(n).unwrap_or(0)))
            .or_else(|| number.as_f64().map(float_to_count)),
        Value::String(text) => {
            let trimmed = text.trim().replace(',', "");
            trimmed
                .parse::<u64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(float_to_count))
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn float_to_count(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        value.round() as u64
    }
}

fn value_as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => number.as_i64().and_then(epoch_to_datetime),
        Value::String(text) => parse_timestamp(text),
        _ => None,
    }
}

fn epoch_to_datetime(epoch: i64) -> Option<DateTime<Utc>> {
    if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(epoch).single()
    } else {
        Utc.timestamp_opt(epoch, 0).single()
    }
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS`, a bare date, or an epoch string.
pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    trimmed.parse::<i64>().ok().and_then(epoch_to_datetime)
}
