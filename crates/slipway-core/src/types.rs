use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// One entry in the ordered model list produced by compilation.
///
/// `config` is `None` for a model pulled in only to satisfy an inheritance
/// chain; the start phase creates the type for such records but does not
/// register visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<Value>,
    /// Companion module file backing the definition, when one was discovered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
}

/// A mixin that survived usage filtering: at least one compiled model
/// references it under `definition.mixins`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixinRecord {
    pub name: String,
    pub source_file: PathBuf,
}

/// Compiled middleware bundle: the deduplicated phase declaration list plus
/// every middleware entry in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiddlewareInstructions {
    pub phases: Vec<String>,
    pub middleware: Vec<MiddlewareEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareEntry {
    pub source_file: PathBuf,
    /// Named sub-export selected with `#fragment` syntax, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    pub config: MiddlewareConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Possibly suffixed with `:before`/`:after`; entries keep the suffix,
    /// the phase declaration list collapses it.
    pub phase: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_enabled() -> bool {
    true
}

/// A component resolved at compile time, executed at start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEntry {
    pub source_file: PathBuf,
    pub config: Value,
}

/// A caller-supplied model definition, bypassing directory scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub definition: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_record_omits_empty_fields() {
        let record = ModelRecord {
            name: "Vehicle".into(),
            config: None,
            definition: Some(json!({"name": "Vehicle"})),
            source_file: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("config").is_none());
        assert!(value.get("source_file").is_none());
        assert_eq!(value["definition"]["name"], "Vehicle");
    }

    #[test]
    fn middleware_config_defaults() {
        let config: MiddlewareConfig =
            serde_json::from_value(json!({"phase": "routes"})).unwrap();
        assert!(config.enabled);
        assert!(config.params.is_null());
        assert!(config.paths.is_none());
        assert!(config.extra.is_empty());
    }

    #[test]
    fn middleware_config_keeps_unknown_keys() {
        let config: MiddlewareConfig = serde_json::from_value(json!({
            "phase": "auth:before",
            "enabled": false,
            "methods": ["GET"]
        }))
        .unwrap();
        assert_eq!(config.phase, "auth:before");
        assert!(!config.enabled);
        assert_eq!(config.extra["methods"], json!(["GET"]));
    }
}
