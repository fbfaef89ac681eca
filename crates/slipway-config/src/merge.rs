//! Strict deep merge for layered configuration objects.
//!
//! Merges an overlay onto an accumulator in place, key by key, with hard
//! type-compatibility rules. Every failure names the full dotted/bracketed
//! key path (`rest.operations[0].nested`) so callers can assert on it.

use serde_json::Value;
use slipway_core::{BootError, Result};

/// Merge `source` onto `target` in place.
///
/// - an existing `null` accepts any incoming value (this is how brand-new
///   keys are introduced);
/// - objects merge recursively, key by key;
/// - arrays merge positionally and only when lengths match;
/// - scalars are overwritten by the incoming value;
/// - any other combination is a type-mismatch error naming the key path.
///
/// `path` is the key-path prefix for error reporting; pass `""` at the root.
pub fn merge_values(target: &mut Value, source: &Value, path: &str) -> Result<()> {
    match (&mut *target, source) {
        (Value::Null, _) => {
            *target = source.clone();
            Ok(())
        }
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                let key_path = child_path(path, key);
                match target_map.get_mut(key) {
                    Some(target_value) => merge_values(target_value, source_value, &key_path)?,
                    None => {
                        target_map.insert(key.clone(), source_value.clone());
                    }
                }
            }
            Ok(())
        }
        (Value::Array(target_items), Value::Array(source_items)) => {
            if target_items.len() != source_items.len() {
                return Err(BootError::MergeLengthMismatch {
                    path: path.to_string(),
                    existing: target_items.len(),
                    incoming: source_items.len(),
                });
            }
            for (i, source_item) in source_items.iter().enumerate() {
                merge_values(&mut target_items[i], source_item, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        (existing, incoming) if is_scalar(existing) && is_scalar(incoming) => {
            *target = incoming.clone();
            Ok(())
        }
        (existing, incoming) => Err(BootError::MergeTypeMismatch {
            path: path.to_string(),
            existing: kind(existing),
            incoming: kind(incoming),
        }),
    }
}

fn child_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
