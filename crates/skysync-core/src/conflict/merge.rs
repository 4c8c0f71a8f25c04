use std::collections::HashSet;

use serde_json::{Map, Value};

use super::{ConflictStrategy, ResolutionError};

/// Deepest object/array nesting the merge will descend into.
///
/// `serde_json::Value` is an owned tree and cannot reference itself, so a
/// self-referential record can only reach the merge as unbounded nesting.
/// The limit matches serde_json's own parser recursion limit.
pub const MAX_MERGE_DEPTH: usize = 128;

/// Deep-merge two records. Both must be JSON objects.
pub(super) fn merge_records(local: &Value, remote: &Value) -> Result<Value, ResolutionError> {
    match (local, remote) {
        (Value::Object(local), Value::Object(remote)) => {
            Ok(Value::Object(merge_objects(local, remote, 1)?))
        }
        _ => Err(ResolutionError::Failed {
            strategy: ConflictStrategy::Merge,
            message: "both records must be JSON objects".to_string(),
        }),
    }
}

fn merge_objects(
    local: &Map<String, Value>,
    remote: &Map<String, Value>,
    depth: usize,
) -> Result<Map<String, Value>, ResolutionError> {
    ensure_depth(depth)?;

    let mut merged = Map::with_capacity(local.len() + remote.len());
    for (key, local_value) in local {
        let value = match remote.get(key) {
            Some(remote_value) => merge_values(local_value, remote_value, depth + 1)?,
            None => local_value.clone(),
        };
        merged.insert(key.clone(), value);
    }
    for (key, remote_value) in remote {
        if !local.contains_key(key) {
            merged.insert(key.clone(), remote_value.clone());
        }
    }
    Ok(merged)
}

fn merge_values(local: &Value, remote: &Value, depth: usize) -> Result<Value, ResolutionError> {
    match (local, remote) {
        (Value::Object(local), Value::Object(remote)) => {
            Ok(Value::Object(merge_objects(local, remote, depth)?))
        }
        (Value::Array(local), Value::Array(remote)) => {
            ensure_depth(depth)?;
            Ok(Value::Array(union_arrays(local, remote)))
        }
        _ => Ok(local.clone()),
    }
}

/// Union without duplicates: local elements first, then unseen remote ones,
/// each in order of first appearance.
///
/// Elements are keyed by a serialized form with object keys sorted, so
/// values that compare equal always produce equal keys.
fn union_arrays(local: &[Value], remote: &[Value]) -> Vec<Value> {
    let capacity = local.len() + remote.len();
    let mut seen = HashSet::with_capacity(capacity);
    let mut merged = Vec::with_capacity(capacity);
    for value in local.iter().chain(remote) {
        let mut key = String::new();
        write_union_key(value, &mut key);
        if seen.insert(key) {
            merged.push(value.clone());
        }
    }
    merged
}

fn write_union_key(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for item in items {
                write_union_key(item, out);
                out.push(',');
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_unstable_by(|(left, _), (right, _)| left.cmp(right));
            out.push('{');
            for (key, item) in entries {
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_union_key(item, out);
                out.push(',');
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

const fn ensure_depth(depth: usize) -> Result<(), ResolutionError> {
    if depth > MAX_MERGE_DEPTH {
        return Err(ResolutionError::NestingTooDeep {
            limit: MAX_MERGE_DEPTH,
        });
    }
    Ok(())
}
