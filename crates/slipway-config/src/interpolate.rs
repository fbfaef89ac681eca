//! `${VAR}` interpolation for configuration values.
//!
//! A token is only recognized as a full-string suffix match; partial
//! interpolation inside a string is deliberately not supported. Resolution
//! order: the explicit environment snapshot (when one was supplied), then the
//! application's key/value getter. An unresolved token becomes `null` — not
//! the literal placeholder — so downstream defaults can kick in.

use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Lookup chain for dynamic config variables.
pub struct VarLookup<'a> {
    /// Explicit environment snapshot; `None` disables environment lookups.
    pub env: Option<&'a HashMap<String, String>>,
    /// The application collaborator's settings getter.
    pub app: &'a dyn Fn(&str) -> Option<Value>,
}

/// Resolve every `${VAR}` token in `value`, recursing through arrays and
/// objects in place.
pub fn resolve_variables(value: &mut Value, lookup: &VarLookup<'_>) {
    match value {
        Value::String(s) => {
            if let Some(var) = suffix_token(s) {
                let var = var.to_string();
                let resolved = lookup
                    .env
                    .and_then(|env| env.get(&var).map(|v| Value::String(v.clone())))
                    .or_else(|| (lookup.app)(&var));
                match resolved {
                    Some(v) => *value = v,
                    None => {
                        warn!(variable = %var, "unresolved config variable, substituting null");
                        *value = Value::Null;
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                resolve_variables(item, lookup);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                resolve_variables(item, lookup);
            }
        }
        _ => {}
    }
}

/// The variable name when `s` ends with a `${VAR}` token.
fn suffix_token(s: &str) -> Option<&str> {
    let body = s.strip_suffix('}')?;
    let start = body.rfind("${")?;
    let var = &body[start + 2..];
    if var.is_empty() || !var.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some(var)
}
