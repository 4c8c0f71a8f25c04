//! Translation between platform-A attribute bags and platform-B flat maps.
//!
//! Platform B stores every attribute as a string: timestamps as epoch
//! milliseconds, lists as JSON arrays, the icon as base64 and extras under an
//! `x-` key prefix. Absent or empty values translate to empty/zero fields.

mod store;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::{AttributeBag, RemoteAttributes};

pub use store::{FileMetadataStore, InMemoryMetadataStore, MetadataStore};

const KEY_CREATION_TIME: &str = "creationTime";
const KEY_MODIFICATION_TIME: &str = "modificationTime";
const KEY_LABEL: &str = "label";
const KEY_TAGS: &str = "tags";
const KEY_TYPE_IDENTIFIER: &str = "typeIdentifier";
const KEY_QUARANTINE: &str = "quarantine";
const KEY_ICON: &str = "icon";
const KEY_FLAGS: &str = "flags";
const KEY_ACL: &str = "acl";
const KEY_COMMENT: &str = "comment";
const KEY_CONTENT_CREATION_TIME: &str = "contentCreationTime";
const EXTRA_PREFIX: &str = "x-";

/// Platform-A spellings accepted as aliases when reading a flat map.
const KNOWN_KEYS: &[(&str, &[&str])] = &[
    (KEY_CREATION_TIME, &["creationDate"]),
    (KEY_MODIFICATION_TIME, &["modificationDate"]),
    (KEY_LABEL, &[]),
    (KEY_TAGS, &[]),
    (KEY_TYPE_IDENTIFIER, &[]),
    (KEY_QUARANTINE, &[]),
    (KEY_ICON, &[]),
    (KEY_FLAGS, &[]),
    (KEY_ACL, &[]),
    (KEY_COMMENT, &[]),
    (KEY_CONTENT_CREATION_TIME, &["contentCreationDate"]),
];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Invalid metadata field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("Malformed metadata: {0}")]
    Malformed(String),
    #[error("Metadata store error: {0}")]
    Store(#[from] crate::Error),
}

/// Translate a platform-A bag into the platform-B flat map.
///
/// Empty and zero fields are omitted.
pub fn to_remote_attributes(bag: &AttributeBag) -> RemoteAttributes {
    let mut attributes = RemoteAttributes::new();

    let mut put = |key: &str, value: String| {
        if !value.is_empty() {
            attributes.insert(key.to_string(), value);
        }
    };

    put(KEY_CREATION_TIME, format_epoch_millis(bag.creation_date));
    put(KEY_MODIFICATION_TIME, format_epoch_millis(bag.modification_date));
    put(KEY_LABEL, bag.label.clone());
    put(KEY_TAGS, format_list(&bag.tags));
    put(KEY_TYPE_IDENTIFIER, bag.type_identifier.clone());
    put(KEY_QUARANTINE, bag.quarantine.clone());
    put(KEY_ICON, STANDARD.encode(&bag.icon));
    if bag.flags != 0 {
        put(KEY_FLAGS, bag.flags.to_string());
    }
    put(KEY_ACL, format_list(&bag.acl));
    put(KEY_COMMENT, bag.comment.clone());
    put(
        KEY_CONTENT_CREATION_TIME,
        format_epoch_millis(bag.content_creation_date),
    );

    for (key, value) in &bag.extras {
        attributes.insert(format!("{EXTRA_PREFIX}{key}"), value.clone());
    }

    attributes
}

/// Translate a platform-B flat map into a platform-A bag.
///
/// Keys outside the known set become extras. Present but unparseable
/// timestamps, flags, lists or icons are errors.
pub fn from_remote_attributes(
    attributes: &RemoteAttributes,
) -> Result<AttributeBag, MetadataError> {
    let lookup = |key: &str| lookup_attribute(attributes, key);

    let mut bag = AttributeBag {
        creation_date: lookup(KEY_CREATION_TIME)
            .map(|raw| parse_timestamp(KEY_CREATION_TIME, raw))
            .transpose()?,
        modification_date: lookup(KEY_MODIFICATION_TIME)
            .map(|raw| parse_timestamp(KEY_MODIFICATION_TIME, raw))
            .transpose()?,
        label: lookup(KEY_LABEL).unwrap_or_default().to_string(),
        tags: lookup(KEY_TAGS)
            .map(|raw| parse_list(KEY_TAGS, raw))
            .transpose()?
            .unwrap_or_default(),
        type_identifier: lookup(KEY_TYPE_IDENTIFIER)
            .unwrap_or_default()
            .to_string(),
        quarantine: lookup(KEY_QUARANTINE).unwrap_or_default().to_string(),
        icon: lookup(KEY_ICON)
            .map(|raw| {
                STANDARD
                    .decode(raw)
                    .map_err(|error| invalid_field(KEY_ICON, error))
            })
            .transpose()?
            .unwrap_or_default(),
        flags: lookup(KEY_FLAGS)
            .map(|raw| raw.parse::<u32>().map_err(|error| invalid_field(KEY_FLAGS, error)))
            .transpose()?
            .unwrap_or_default(),
        acl: lookup(KEY_ACL)
            .map(|raw| parse_list(KEY_ACL, raw))
            .transpose()?
            .unwrap_or_default(),
        comment: lookup(KEY_COMMENT).unwrap_or_default().to_string(),
        content_creation_date: lookup(KEY_CONTENT_CREATION_TIME)
            .map(|raw| parse_timestamp(KEY_CONTENT_CREATION_TIME, raw))
            .transpose()?,
        ..AttributeBag::default()
    };

    for (key, value) in attributes {
        if let Some(extra) = key.strip_prefix(EXTRA_PREFIX) {
            bag.extras.insert(extra.to_string(), value.clone());
        } else if !is_known_key(key) {
            bag.extras.insert(key.clone(), value.clone());
        }
    }

    Ok(bag.normalized())
}

/// Translate a record's `metadata` value into a platform-A bag.
///
/// A flat object of scalars is read as platform-B attributes; an object with
/// nested values is read as a platform-A document.
pub fn translate_metadata(value: &Value) -> Result<AttributeBag, MetadataError> {
    let Value::Object(map) = value else {
        return Err(MetadataError::Malformed(
            "metadata must be a JSON object".to_string(),
        ));
    };

    let is_flat = map
        .values()
        .all(|value| !matches!(value, Value::Array(_) | Value::Object(_)));

    if is_flat {
        let attributes = map
            .iter()
            .filter_map(|(key, value)| scalar_to_string(value).map(|value| (key.clone(), value)))
            .collect::<RemoteAttributes>();
        return from_remote_attributes(&attributes);
    }

    let bag: AttributeBag = serde_json::from_value(value.clone())
        .map_err(|error| MetadataError::Malformed(error.to_string()))?;
    Ok(bag.normalized())
}

fn lookup_attribute<'a>(attributes: &'a RemoteAttributes, key: &str) -> Option<&'a str> {
    let aliases: &[&str] = KNOWN_KEYS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, aliases)| *aliases)
        .unwrap_or_default();
    std::iter::once(key)
        .chain(aliases.iter().copied())
        .find_map(|candidate| attributes.get(candidate))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn is_known_key(key: &str) -> bool {
    KNOWN_KEYS
        .iter()
        .any(|(name, aliases)| *name == key || aliases.contains(&key))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn format_epoch_millis(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(String::new, |timestamp| {
        timestamp.timestamp_millis().to_string()
    })
}

fn format_list(values: &[String]) -> String {
    if values.is_empty() {
        return String::new();
    }
    serde_json::to_string(values).unwrap_or_default()
}

/// Parse epoch milliseconds or an ISO-8601 timestamp.
pub(crate) fn parse_timestamp_value(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, MetadataError> {
    parse_timestamp_value(raw).ok_or_else(|| MetadataError::InvalidField {
        field: field.to_string(),
        reason: format!("'{raw}' is neither epoch milliseconds nor ISO-8601"),
    })
}

fn parse_list(field: &str, raw: &str) -> Result<Vec<String>, MetadataError> {
    if raw.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(raw).map_err(|error| invalid_field(field, error));
    }
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect())
}

fn invalid_field(field: &str, error: impl std::fmt::Display) -> MetadataError {
    MetadataError::InvalidField {
        field: field.to_string(),
        reason: error.to_string(),
    }
}
