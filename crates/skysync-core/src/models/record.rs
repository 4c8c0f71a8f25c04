//! Sync record model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request method applied to a batch of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl SyncMethod {
    /// Whether requests with this method serialize the batch as a body.
    pub const fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }

    /// Whether a successful request applied record contents remotely.
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("Unsupported sync method: {other}")),
        }
    }
}

/// A caller-defined record with a mandatory string `id`.
///
/// The record is kept as the JSON object the caller submitted and is never
/// mutated by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SyncRecord {
    #[serde(skip)]
    id: String,
    fields: Value,
}

impl SyncRecord {
    /// Validate the shape of a submitted entry.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(map) = &value else {
            return Err(format!(
                "Record must be a JSON object, got {}",
                json_type_name(&value)
            ));
        };

        let id = match map.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Value::String(_)) => return Err("Record id cannot be empty".to_string()),
            Some(other) => {
                return Err(format!(
                    "Record id must be a string, got {}",
                    json_type_name(other)
                ))
            }
            None => return Err("Record is missing required field `id`".to_string()),
        };

        Ok(Self { id, fields: value })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Platform attribute metadata attached to the record, if any.
    pub fn metadata(&self) -> Option<&Value> {
        self.fields.get("metadata").filter(|value| !value.is_null())
    }

    pub const fn as_value(&self) -> &Value {
        &self.fields
    }
}

/// One record or a collection of records submitted to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncInput {
    One(Value),
    Many(Vec<Value>),
}

impl SyncInput {
    pub fn into_entries(self) -> Vec<Value> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

impl From<Value> for SyncInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => Self::Many(values),
            other => Self::One(other),
        }
    }
}

impl From<Vec<Value>> for SyncInput {
    fn from(values: Vec<Value>) -> Self {
        Self::Many(values)
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sync_record_requires_object_with_string_id() {
        assert!(SyncRecord::from_value(Value::Null).is_err());
        assert!(SyncRecord::from_value(json!([1, 2])).is_err());
        assert!(SyncRecord::from_value(json!({"name": "John"})).is_err());
        assert!(SyncRecord::from_value(json!({"id": 7})).is_err());
        assert!(SyncRecord::from_value(json!({"id": "  "})).is_err());

        let record = SyncRecord::from_value(json!({"id": "c1", "name": "John"})).unwrap();
        assert_eq!(record.id(), "c1");
        assert!(record.metadata().is_none());
    }

    #[test]
    fn sync_record_ignores_null_metadata() {
        let record = SyncRecord::from_value(json!({"id": "c1", "metadata": null})).unwrap();
        assert!(record.metadata().is_none());

        let record =
            SyncRecord::from_value(json!({"id": "c1", "metadata": {"label": "red"}})).unwrap();
        assert_eq!(record.metadata(), Some(&json!({"label": "red"})));
    }

    #[test]
    fn sync_record_serializes_as_submitted_object() {
        let value = json!({"id": "c1", "name": "John"});
        let record = SyncRecord::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), value);
    }

    #[test]
    fn sync_input_splits_arrays_into_entries() {
        let input = SyncInput::from(json!([{"id": "a"}, {"id": "b"}]));
        assert_eq!(input.into_entries().len(), 2);

        let input = SyncInput::from(json!({"id": "a"}));
        assert_eq!(input.into_entries(), vec![json!({"id": "a"})]);
    }

    #[test]
    fn sync_method_parses_case_insensitively() {
        assert_eq!("put".parse::<SyncMethod>().unwrap(), SyncMethod::Put);
        assert_eq!(" Delete ".parse::<SyncMethod>().unwrap(), SyncMethod::Delete);
        assert!("PATCH".parse::<SyncMethod>().is_err());
        assert!(SyncMethod::Post.carries_body());
        assert!(!SyncMethod::Get.carries_body());
    }
}
