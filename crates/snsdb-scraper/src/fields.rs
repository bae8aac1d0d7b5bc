//! Schema-drift tolerant field access over raw provider records.
//!
//! Each logical field is an ordered list of candidate keys; the first key
//! holding a present, non-blank value wins.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

/// Epoch values at or above this are milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// Keys tried when an image field holds an object instead of a URL string.
const NESTED_URL_KEYS: &[&str] = &["url", "imageUrl", "src"];

/// The first value under `keys` that is neither null nor a blank string.
#[must_use]
pub fn first_present<'a>(record: &'a Record, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| record.get(*k)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

/// The first present value rendered as trimmed text. Numbers are accepted
/// (ids are often numeric); booleans, arrays and objects are not.
#[must_use]
pub fn text(record: &Record, keys: &[&str]) -> Option<String> {
    match first_present(record, keys)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Like [`text`], but an object value is searched for a nested URL.
#[must_use]
pub fn url(record: &Record, keys: &[&str]) -> Option<String> {
    match first_present(record, keys)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(inner) => text(inner, NESTED_URL_KEYS),
        _ => None,
    }
}

/// The first value under `keys` that converts to a count.
#[must_use]
pub fn count(record: &Record, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .find_map(to_count)
}

#[must_use]
pub fn flag(record: &Record, keys: &[&str]) -> bool {
    match first_present(record, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

#[must_use]
pub fn timestamp(record: &Record, keys: &[&str]) -> Option<DateTime<Utc>> {
    first_present(record, keys).and_then(to_timestamp)
}

/// The first object under `keys`.
#[must_use]
pub fn object<'a>(record: &'a Record, keys: &[&str]) -> Option<&'a Record> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .find_map(Value::as_object)
}

/// Integers, floats (truncated) and strings like `"12,345"` or `"1.2e3"`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn to_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned
                .parse::<i64>()
                .ok()
                .or_else(|| cleaned.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

/// Epoch seconds or milliseconds (number or digit string), RFC 3339, a naive
/// ISO datetime taken as UTC, or the `Wed Oct 10 20:19:24 +0000 2018` form.
#[must_use]
pub fn to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(f64_to_i64)).and_then(from_epoch),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                return s.parse::<i64>().ok().and_then(from_epoch);
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| {
                    DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y")
                        .map(|dt| dt.with_timezone(&Utc))
                })
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn f64_to_i64(f: f64) -> i64 {
    f as i64
}

fn from_epoch(epoch: i64) -> Option<DateTime<Utc>> {
    if epoch >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(epoch).single()
    } else {
        Utc.timestamp_opt(epoch, 0).single()
    }
}
