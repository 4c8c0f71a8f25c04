use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::metadata::parse_timestamp_value;

/// Field compared by last-write-wins.
pub const MODIFICATION_DATE_FIELD: &str = "modificationDate";

/// Parse a record's modification date.
///
/// Accepts ISO-8601 strings and epoch milliseconds (as a number or a
/// numeric string). Anything else yields `None`.
pub fn modification_date(record: &Value) -> Option<DateTime<Utc>> {
    match record.get(MODIFICATION_DATE_FIELD)? {
        Value::String(raw) => parse_timestamp_value(raw),
        Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Pick the most recently modified side.
///
/// An unparseable date counts as infinitely old for its side only. Local
/// wins exact ties and the case where neither side parses.
pub(super) fn last_write_wins<'a>(local: &'a Value, remote: &'a Value) -> &'a Value {
    match (modification_date(local), modification_date(remote)) {
        (Some(local_date), Some(remote_date)) if local_date >= remote_date => local,
        (Some(_), Some(_)) | (None, Some(_)) => remote,
        (Some(_), None) | (None, None) => local,
    }
}
