//! Attribute bag models for the two platform metadata encodings

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform-B attribute bag: a flat map of string-serialized values.
pub type RemoteAttributes = BTreeMap<String, String>;

/// Platform-A attribute bag.
///
/// Every field defaults to empty/zero so partial documents deserialize.
/// Timestamps serialize as ISO-8601 strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttributeBag {
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    /// Display label (Finder-style color/name label)
    pub label: String,
    /// Ordered set of tags
    pub tags: Vec<String>,
    /// Uniform type identifier of the content
    pub type_identifier: String,
    /// Quarantine marker recorded by the originating platform
    pub quarantine: String,
    /// Custom icon blob, base64 in JSON
    #[serde(with = "base64_bytes")]
    pub icon: Vec<u8>,
    /// Platform flag bitmask
    pub flags: u32,
    /// Access-control list of principal identifiers, in order
    pub acl: Vec<String>,
    pub comment: String,
    pub content_creation_date: Option<DateTime<Utc>>,
    /// Open-ended custom key/value extras
    pub extras: BTreeMap<String, String>,
}

impl AttributeBag {
    /// Drop duplicate tags and ACL entries, keeping first appearances, and
    /// truncate timestamps to the millisecond precision platform B carries.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.tags = dedupe_preserving_order(self.tags);
        self.acl = dedupe_preserving_order(self.acl);
        self.creation_date = self.creation_date.map(truncate_to_millis);
        self.modification_date = self.modification_date.map(truncate_to_millis);
        self.content_creation_date = self.content_creation_date.map(truncate_to_millis);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn dedupe_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim().to_string();
        if !value.is_empty() && !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp)
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.trim())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn partial_documents_default_missing_fields() {
        let bag: AttributeBag = serde_json::from_value(json!({
            "label": "Red",
            "tags": ["work"],
        }))
        .unwrap();

        assert_eq!(bag.label, "Red");
        assert_eq!(bag.tags, vec!["work".to_string()]);
        assert_eq!(bag.creation_date, None);
        assert_eq!(bag.flags, 0);
        assert!(bag.icon.is_empty());
    }

    #[test]
    fn icon_serializes_as_base64() {
        let bag = AttributeBag {
            icon: vec![0, 1, 2, 255],
            ..AttributeBag::default()
        };
        let value = serde_json::to_value(&bag).unwrap();
        assert_eq!(value["icon"], json!("AAEC/w=="));

        let decoded: AttributeBag = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.icon, vec![0, 1, 2, 255]);
    }

    #[test]
    fn normalized_dedupes_tags_and_truncates_timestamps() {
        let timestamp = DateTime::parse_from_rfc3339("2024-03-01T10:00:00.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        let bag = AttributeBag {
            tags: vec![
                "b".to_string(),
                "a".to_string(),
                "b".to_string(),
                " ".to_string(),
            ],
            creation_date: Some(timestamp),
            ..AttributeBag::default()
        }
        .normalized();

        assert_eq!(bag.tags, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(
            bag.creation_date.unwrap().timestamp_micros(),
            timestamp.timestamp_millis() * 1000
        );
    }
}
