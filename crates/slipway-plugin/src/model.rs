//! Model plugin (`model-config.json` + overlays).
//!
//! Compilation resolves model definition files, pulls in base models
//! transitively, and topologically sorts the result so bases always precede
//! derivatives. The start phase creates every model type and attaches the
//! configured ones.

use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::base::ArtifactPlugin;
use slipway_core::{
    BootContext, BootError, BootPlugin, HookOutcome, ModelRecord, Result,
};

const NAME: &str = "models";

/// Top-level model-config keys rejected as unsupported legacy format.
const LEGACY_FIELDS: [&str; 3] = ["properties", "base", "plural"];

pub struct ModelPlugin;

impl ArtifactPlugin for ModelPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config_name(&self) -> &str {
        "model-config"
    }

    fn build_instructions(
        &self,
        ctx: &BootContext,
        root: &Path,
        config: &Value,
    ) -> Result<Option<Value>> {
        let records = build_model_instructions(ctx, root, config)?;
        Ok(Some(serde_json::to_value(records)?))
    }
}

impl BootPlugin for ModelPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn load(&self, ctx: &mut BootContext) -> Result<()> {
        self.load_artifact(ctx)
    }

    fn compile(&self, ctx: &mut BootContext) -> Result<()> {
        self.compile_artifact(ctx)
    }

    fn start(&self, ctx: &mut BootContext) -> Result<HookOutcome> {
        let records: Vec<ModelRecord> = ctx.typed_instructions(NAME)?.unwrap_or_default();
        for record in &records {
            if record.definition.is_some() {
                ctx.app.models().create_model(record)?;
            }
            // A record without config exists only to satisfy inheritance;
            // the type is created but never exposed.
            if let Some(config) = &record.config {
                ctx.app.attach_model(&record.name, config.clone())?;
            }
        }
        info!(count = records.len(), "models defined");
        Ok(HookOutcome::Done)
    }
}

// ── Definition discovery ───────────────────────────────────────

struct DiscoveredModel {
    name: String,
    definition: Value,
    source_file: Option<PathBuf>,
}

fn discover_definitions(
    ctx: &BootContext,
    root: &Path,
    config: &Map<String, Value>,
) -> Result<Vec<DiscoveredModel>> {
    if !ctx.options.model_definitions.is_empty() {
        let mut discovered = Vec::new();
        for supplied in &ctx.options.model_definitions {
            let name = supplied
                .definition
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    BootError::Config("explicit model definition is missing `name`".into())
                })?;
            discovered.push(DiscoveredModel {
                name: name.to_string(),
                definition: supplied.definition.clone(),
                source_file: supplied.source_file.clone(),
            });
        }
        return Ok(discovered);
    }

    let mut discovered = Vec::new();
    for dir in definition_sources(ctx, root, config) {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "model source directory does not exist, skipping");
            continue;
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        entries.sort();
        for path in entries {
            let file = slipway_config::load_config_file(&path)?;
            let name = file
                .data
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    path.file_stem()
                        .and_then(|s| s.to_str())
                        .map(str::to_string)
                })
                .ok_or_else(|| {
                    BootError::Config(format!(
                        "cannot determine model name for {}",
                        path.display()
                    ))
                })?;
            let source_file = companion_module(&path, &ctx.options.module_extensions);
            discovered.push(DiscoveredModel {
                name,
                definition: file.data,
                source_file,
            });
        }
    }
    Ok(discovered)
}

fn definition_sources(ctx: &BootContext, root: &Path, config: &Map<String, Value>) -> Vec<PathBuf> {
    let configured: Vec<PathBuf> = if !ctx.options.model_sources.is_empty() {
        ctx.options.model_sources.clone()
    } else {
        config
            .get("_meta")
            .and_then(|meta| meta.get("sources"))
            .and_then(Value::as_array)
            .map(|sources| {
                sources
                    .iter()
                    .filter_map(Value::as_str)
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_else(|| vec![PathBuf::from("./models")])
    };
    configured
        .into_iter()
        .map(|dir| if dir.is_absolute() { dir } else { root.join(dir) })
        .collect()
}

/// Companion module file with the same stem and a supported extension.
fn companion_module(definition_path: &Path, extensions: &[String]) -> Option<PathBuf> {
    extensions
        .iter()
        .map(|ext| definition_path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

// ── Record assembly ────────────────────────────────────────────

fn build_model_instructions(
    ctx: &BootContext,
    root: &Path,
    config: &Value,
) -> Result<Vec<ModelRecord>> {
    let config_map = config.as_object().cloned().unwrap_or_default();

    for (model, entry) in &config_map {
        if model == "_meta" {
            continue;
        }
        if let Some(entry_map) = entry.as_object() {
            for field in LEGACY_FIELDS {
                if entry_map.contains_key(field) {
                    return Err(BootError::LegacyFormat {
                        model: model.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }
    }

    let registry = discover_definitions(ctx, root, &config_map)?;

    let mut records: Vec<ModelRecord> = Vec::new();
    let mut pending: VecDeque<String> = config_map
        .keys()
        .filter(|name| name.as_str() != "_meta")
        .cloned()
        .collect();

    while let Some(name) = pending.pop_front() {
        if records.iter().any(|r| r.name == name) {
            continue;
        }
        let discovered = registry.iter().find(|d| d.name == name);
        if let Some(model) = discovered {
            if let Some(base) = base_model(&model.definition) {
                if registry.iter().any(|d| d.name == base) {
                    // Pull the base in even when it is not configured, so the
                    // inheritance chain resolves.
                    pending.push_back(base.to_string());
                } else if !ctx.options.external_models.contains(base) {
                    warn!(
                        model = %name,
                        base = %base,
                        "base model not found in any source directory; assuming it is provided externally"
                    );
                }
            }
        }
        records.push(ModelRecord {
            name: name.clone(),
            config: config_map.get(&name).cloned(),
            definition: discovered.map(|d| d.definition.clone()),
            source_file: discovered.and_then(|d| d.source_file.clone()),
        });
    }

    sort_by_inheritance(records)
}

fn base_model(definition: &Value) -> Option<&str> {
    definition
        .get("base")
        .and_then(Value::as_str)
        .or_else(|| {
            definition
                .get("options")
                .and_then(|options| options.get("base"))
                .and_then(Value::as_str)
        })
}

/// Topological sort over the base→derived relation, stable for records with
/// no ordering constraint between them.
fn sort_by_inheritance(records: Vec<ModelRecord>) -> Result<Vec<ModelRecord>> {
    let bases: Vec<Option<String>> = records
        .iter()
        .map(|record| {
            record
                .definition
                .as_ref()
                .and_then(base_model)
                .filter(|base| records.iter().any(|r| r.name == **base))
                .map(str::to_string)
        })
        .collect();

    let mut sorted: Vec<ModelRecord> = Vec::with_capacity(records.len());
    let mut placed: Vec<bool> = vec![false; records.len()];

    while sorted.len() < records.len() {
        let mut progressed = false;
        for (i, record) in records.iter().enumerate() {
            if placed[i] {
                continue;
            }
            let ready = match &bases[i] {
                Some(base) => sorted.iter().any(|r| &r.name == base),
                None => true,
            };
            if ready {
                sorted.push(record.clone());
                placed[i] = true;
                progressed = true;
            }
        }
        if !progressed {
            return Err(BootError::CyclicDependency);
        }
    }
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slipway_core::{BootOptions, InMemoryApplication, ModelDefinition};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context_with_definitions(
        definitions: Vec<Value>,
        config: Value,
    ) -> (Arc<InMemoryApplication>, BootContext) {
        let app = Arc::new(InMemoryApplication::new());
        let mut options = BootOptions::new("/nonexistent");
        options.model_definitions = definitions
            .into_iter()
            .map(|definition| ModelDefinition {
                definition,
                source_file: None,
            })
            .collect();
        options.configs.insert(NAME.into(), config);
        let mut ctx = BootContext::new(app.clone(), options);
        ModelPlugin.load(&mut ctx).unwrap();
        (app, ctx)
    }

    #[test]
    fn sorts_bases_before_derivatives() {
        let (_, mut ctx) = context_with_definitions(
            vec![
                json!({"name": "FlyingCar", "base": "Car"}),
                json!({"name": "Vehicle"}),
                json!({"name": "Car", "base": "Vehicle"}),
            ],
            json!({
                "FlyingCar": {"dataSource": "db"},
                "Car": {"dataSource": "db"},
                "Vehicle": {"dataSource": "db"}
            }),
        );
        ModelPlugin.compile(&mut ctx).unwrap();
        let records: Vec<ModelRecord> = ctx.typed_instructions(NAME).unwrap().unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["Vehicle", "Car", "FlyingCar"]);
    }

    #[test]
    fn unconfigured_base_is_pulled_in_without_config() {
        let (_, mut ctx) = context_with_definitions(
            vec![
                json!({"name": "Car", "base": "Vehicle"}),
                json!({"name": "Vehicle"}),
            ],
            json!({"Car": {"dataSource": "db"}}),
        );
        ModelPlugin.compile(&mut ctx).unwrap();
        let records: Vec<ModelRecord> = ctx.typed_instructions(NAME).unwrap().unwrap();
        assert_eq!(records.len(), 2);
        let vehicle = records.iter().find(|r| r.name == "Vehicle").unwrap();
        assert!(vehicle.config.is_none());
        assert!(vehicle.definition.is_some());
    }

    #[test]
    fn base_cycle_is_fatal() {
        let (_, mut ctx) = context_with_definitions(
            vec![
                json!({"name": "A", "base": "B"}),
                json!({"name": "B", "base": "A"}),
            ],
            json!({"A": {"dataSource": "db"}}),
        );
        let err = ModelPlugin.compile(&mut ctx).unwrap_err();
        assert!(matches!(err, BootError::CyclicDependency));
    }

    #[test]
    fn legacy_fields_are_rejected() {
        let (_, mut ctx) = context_with_definitions(
            vec![],
            json!({"Car": {"dataSource": "db", "properties": {"color": "string"}}}),
        );
        let err = ModelPlugin.compile(&mut ctx).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Car") && msg.contains("properties"), "got: {msg}");
    }

    #[test]
    fn base_in_options_base_is_honored() {
        let (_, mut ctx) = context_with_definitions(
            vec![
                json!({"name": "Car", "options": {"base": "Vehicle"}}),
                json!({"name": "Vehicle"}),
            ],
            json!({"Car": {"dataSource": "db"}}),
        );
        ModelPlugin.compile(&mut ctx).unwrap();
        let records: Vec<ModelRecord> = ctx.typed_instructions(NAME).unwrap().unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["Vehicle", "Car"]);
    }

    #[test]
    fn start_creates_all_and_attaches_configured_only() {
        let (app, mut ctx) = context_with_definitions(
            vec![
                json!({"name": "Car", "base": "Vehicle"}),
                json!({"name": "Vehicle"}),
            ],
            json!({"Car": {"dataSource": "db"}}),
        );
        ModelPlugin.compile(&mut ctx).unwrap();
        ModelPlugin.start(&mut ctx).unwrap();

        let created: Vec<_> = app.created_models().iter().map(|m| m.name.clone()).collect();
        assert_eq!(created, vec!["Vehicle", "Car"]);
        let attached = app.attached_models();
        assert!(attached.contains_key("Car"));
        assert!(!attached.contains_key("Vehicle"));
    }

    #[test]
    fn scans_definition_files_from_disk() {
        let dir = TempDir::new().unwrap();
        let models = dir.path().join("models");
        std::fs::create_dir_all(&models).unwrap();
        std::fs::write(
            models.join("vehicle.json"),
            r#"{"name": "Vehicle", "properties": {}}"#,
        )
        .unwrap();
        std::fs::write(models.join("vehicle.wasm"), b"\0asm").unwrap();

        let app = Arc::new(InMemoryApplication::new());
        let mut options = BootOptions::new(dir.path());
        options
            .configs
            .insert(NAME.into(), json!({"Vehicle": {"dataSource": "db"}}));
        let mut ctx = BootContext::new(app, options);
        ModelPlugin.load(&mut ctx).unwrap();
        ModelPlugin.compile(&mut ctx).unwrap();

        let records: Vec<ModelRecord> = ctx.typed_instructions(NAME).unwrap().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].definition.is_some());
        let source = records[0].source_file.as_ref().unwrap();
        assert!(source.to_str().unwrap().ends_with("vehicle.wasm"));
    }
}
