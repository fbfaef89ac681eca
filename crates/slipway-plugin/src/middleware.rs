//! Middleware plugin (`middleware.json` + overlays).
//!
//! Overlays use stricter merge rules than the generic deep merge: an overlay
//! may only adjust phases and middleware the master file already declares.
//! Compilation resolves every module reference up front so a bad reference
//! fails the boot instead of the first request.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::base::ArtifactPlugin;
use slipway_config::{ConfigFile, VarLookup, merge_values, resolve_variables};
use slipway_core::{
    BootContext, BootError, BootPlugin, HookOutcome, MiddlewareConfig, MiddlewareEntry,
    MiddlewareInstructions, Result,
};

const NAME: &str = "middleware";

/// Marks a path in `paths` as relative to the application root.
const PATH_MARKER: &str = "$!";

pub struct MiddlewarePlugin;

impl ArtifactPlugin for MiddlewarePlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn merge_overlay(&self, target: &mut Value, overlay: &ConfigFile) -> Result<()> {
        merge_middleware_config(target, overlay)
    }

    fn build_instructions(
        &self,
        ctx: &BootContext,
        root: &Path,
        config: &Value,
    ) -> Result<Option<Value>> {
        let instructions = build_middleware_instructions(ctx, root, config)?;
        Ok(Some(serde_json::to_value(instructions)?))
    }
}

impl BootPlugin for MiddlewarePlugin {
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
        let Some(instructions): Option<MiddlewareInstructions> = ctx.typed_instructions(NAME)?
        else {
            return Ok(HookOutcome::Done);
        };
        ctx.app.define_middleware_phases(&instructions.phases)?;

        let app = ctx.app.clone();
        let getter = |key: &str| app.get(key);
        let lookup = VarLookup {
            env: ctx.options.env_vars.as_ref(),
            app: &getter,
        };

        for entry in &instructions.middleware {
            if !entry.config.enabled {
                debug!(
                    source = %entry.source_file.display(),
                    phase = %entry.config.phase,
                    "middleware disabled, skipping"
                );
                continue;
            }
            let mut entry = entry.clone();
            resolve_variables(&mut entry.config.params, &lookup);
            let factory = ctx
                .options
                .modules
                .middleware_factory(&entry.source_file, entry.fragment.as_deref())?;
            ctx.app.mount_middleware(factory, &entry)?;
            info!(
                source = %entry.source_file.display(),
                phase = %entry.config.phase,
                "mounted middleware"
            );
        }
        Ok(HookOutcome::Done)
    }
}

// ── Overlay merge ──────────────────────────────────────────────

fn merge_middleware_config(target: &mut Value, overlay: &ConfigFile) -> Result<()> {
    let Some(incoming) = overlay.data.as_object() else {
        return Err(BootError::ConfigParse {
            path: overlay.path.clone(),
            reason: "middleware configuration must be an object".into(),
        });
    };
    let Some(existing) = target.as_object_mut() else {
        return Err(BootError::Config(
            "master middleware configuration must be an object".into(),
        ));
    };

    for (phase, phase_overlay) in incoming {
        let Some(phase_target) = existing.get_mut(phase) else {
            return Err(BootError::ConfigParse {
                path: overlay.path.clone(),
                reason: format!("phase `{phase}` is not defined in the master configuration"),
            });
        };
        merge_phase(phase_target, phase_overlay, phase, overlay)?;
    }
    Ok(())
}

fn merge_phase(
    target: &mut Value,
    overlay_value: &Value,
    phase: &str,
    overlay: &ConfigFile,
) -> Result<()> {
    let (Some(existing), Some(incoming)) = (target.as_object_mut(), overlay_value.as_object())
    else {
        return merge_values(target, overlay_value, phase);
    };
    for (reference, config) in incoming {
        let Some(entry_target) = existing.get_mut(reference) else {
            return Err(BootError::ConfigParse {
                path: overlay.path.clone(),
                reason: format!(
                    "middleware `{reference}` in phase `{phase}` is not defined in the master configuration"
                ),
            });
        };
        merge_entry(entry_target, config, &format!("{phase}.{reference}"))?;
    }
    Ok(())
}

/// Entry values may be a single config object or a list of named instances.
/// When one side is a non-empty object and the other a list, the object is
/// normalized into a one-element list first. List items merge by their
/// `name` key; a non-matching item is appended.
fn merge_entry(target: &mut Value, overlay: &Value, path: &str) -> Result<()> {
    if target.is_object() && overlay.is_array() {
        let seed = match target.as_object() {
            Some(obj) if !obj.is_empty() => vec![target.clone()],
            _ => Vec::new(),
        };
        *target = Value::Array(seed);
    }
    match (&mut *target, overlay) {
        (Value::Array(existing), Value::Array(incoming)) => {
            merge_named_items(existing, incoming, path)
        }
        (Value::Array(existing), Value::Object(obj)) if !obj.is_empty() => {
            merge_named_items(existing, std::slice::from_ref(overlay), path)
        }
        _ => merge_values(target, overlay, path),
    }
}

fn merge_named_items(existing: &mut Vec<Value>, incoming: &[Value], path: &str) -> Result<()> {
    for item in incoming {
        let name = item.get("name").and_then(Value::as_str);
        let matched = name.and_then(|name| {
            existing
                .iter_mut()
                .find(|e| e.get("name").and_then(Value::as_str) == Some(name))
        });
        match matched {
            Some(target) => merge_values(target, item, path)?,
            None => existing.push(item.clone()),
        }
    }
    Ok(())
}

// ── Compilation ────────────────────────────────────────────────

fn build_middleware_instructions(
    ctx: &BootContext,
    root: &Path,
    config: &Value,
) -> Result<MiddlewareInstructions> {
    let phases_config = config.as_object().cloned().unwrap_or_default();

    let mut phases: Vec<String> = Vec::new();
    for phase in phases_config.keys() {
        let base = phase
            .strip_suffix(":before")
            .or_else(|| phase.strip_suffix(":after"))
            .unwrap_or(phase);
        if !phases.iter().any(|p| p == base) {
            phases.push(base.to_string());
        }
    }

    let mut middleware: Vec<MiddlewareEntry> = Vec::new();
    for (phase, entries) in &phases_config {
        let Some(entries) = entries.as_object() else {
            warn!(phase = %phase, "phase entry is not an object, skipping");
            continue;
        };
        for (reference, configs) in entries {
            for item in normalize_to_list(configs) {
                let mut fields = item.as_object().cloned().unwrap_or_default();
                fields.insert("phase".into(), Value::String(phase.clone()));
                let mut config: MiddlewareConfig =
                    serde_json::from_value(Value::Object(fields))?;
                resolve_path_markers(&mut config.params, root);
                if let Some(paths) = config.paths.as_mut() {
                    resolve_path_markers(paths, root);
                }
                let (source_file, fragment) = resolve_middleware(ctx, root, reference)?;
                middleware.push(MiddlewareEntry {
                    source_file,
                    fragment,
                    config,
                });
            }
        }
    }
    Ok(MiddlewareInstructions { phases, middleware })
}

fn normalize_to_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Rewrite `$!./x` and `$!../x` path strings to absolute paths under `root`,
/// recursing through nested arrays and objects. Only those two exact prefixes
/// are markers; any other `$!` string passes through untouched.
fn resolve_path_markers(value: &mut Value, root: &Path) {
    match value {
        Value::String(s) => {
            if let Some(relative) = marked_relative(s) {
                if let Ok(absolute) = std::path::absolute(root.join(relative)) {
                    *value = Value::String(absolute.to_string_lossy().into_owned());
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                resolve_path_markers(item, root);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                resolve_path_markers(item, root);
            }
        }
        _ => {}
    }
}

fn marked_relative(s: &str) -> Option<&str> {
    let rest = s.strip_prefix(PATH_MARKER)?;
    (rest.starts_with("./") || rest.starts_with("../")).then_some(rest)
}

/// Resolve `module#fragment` to a source file. When the named fragment is not
/// among the module's exports, fall back to the conventional sub-module
/// locations before giving up with the original resolution error.
fn resolve_middleware(
    ctx: &BootContext,
    root: &Path,
    reference: &str,
) -> Result<(PathBuf, Option<String>)> {
    let resolver = &ctx.options.modules;
    let (module, fragment) = match reference.split_once('#') {
        Some((module, fragment)) => (module, Some(fragment)),
        None => (reference, None),
    };

    let direct = resolver.resolve(root, module);
    match (&direct, fragment) {
        (Ok(resolved), None) => return Ok((resolved.source_file.clone(), None)),
        (Ok(resolved), Some(fragment)) if resolved.exports.iter().any(|e| e == fragment) => {
            return Ok((resolved.source_file.clone(), Some(fragment.to_string())));
        }
        _ => {}
    }

    if let Some(fragment) = fragment {
        for candidate in [
            format!("{module}/server/middleware/{fragment}"),
            format!("{module}/middleware/{fragment}"),
        ] {
            if let Ok(resolved) = resolver.resolve(root, &candidate) {
                return Ok((resolved.source_file, None));
            }
        }
    }

    let source = match direct {
        Err(err) => err,
        Ok(_) => anyhow::anyhow!("module has no export named `{}`", fragment.unwrap_or_default()),
    };
    Err(BootError::Resolution {
        reference: reference.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slipway_core::{
        BootOptions, ComponentHook, InMemoryApplication, MiddlewareFactory,
        ModuleResolver, ResolvedModule, ScriptHook,
    };
    use std::sync::Arc;

    struct FakeResolver;

    impl ModuleResolver for FakeResolver {
        fn resolve(&self, _root: &Path, reference: &str) -> anyhow::Result<ResolvedModule> {
            match reference {
                "compression" => Ok(ResolvedModule {
                    source_file: PathBuf::from("/modules/compression.wasm"),
                    exports: vec![],
                }),
                "helpers" => Ok(ResolvedModule {
                    source_file: PathBuf::from("/modules/helpers.wasm"),
                    exports: vec!["logger".into()],
                }),
                "shell/server/middleware/rest" => Ok(ResolvedModule {
                    source_file: PathBuf::from("/modules/shell/rest.wasm"),
                    exports: vec![],
                }),
                "shell" => Ok(ResolvedModule {
                    source_file: PathBuf::from("/modules/shell.wasm"),
                    exports: vec![],
                }),
                other => anyhow::bail!("unknown module `{other}`"),
            }
        }

        fn middleware_factory(
            &self,
            _source_file: &Path,
            _fragment: Option<&str>,
        ) -> anyhow::Result<MiddlewareFactory> {
            Ok(Arc::new(|params: &Value| Ok(json!({"built": params}))))
        }

        fn component_hook(&self, _source_file: &Path) -> anyhow::Result<ComponentHook> {
            anyhow::bail!("not a component resolver")
        }

        fn boot_script(&self, _source_file: &Path) -> anyhow::Result<ScriptHook> {
            anyhow::bail!("not a script resolver")
        }
    }

    fn context() -> (Arc<InMemoryApplication>, BootContext) {
        let app = Arc::new(InMemoryApplication::new());
        let mut options = BootOptions::new("/nonexistent");
        options.modules = Arc::new(FakeResolver);
        (app.clone(), BootContext::new(app, options))
    }

    fn compile(config: Value) -> Result<MiddlewareInstructions> {
        let (_, mut ctx) = context();
        ctx.configurations.insert(NAME.into(), config);
        MiddlewarePlugin.compile_artifact(&mut ctx)?;
        Ok(ctx.typed_instructions(NAME)?.unwrap())
    }

    #[test]
    fn phase_suffixes_collapse_in_declaration_order() {
        let instructions = compile(json!({
            "initial:before": {},
            "initial": {},
            "routes": {"compression": {}},
            "routes:after": {},
            "final": {}
        }))
        .unwrap();
        assert_eq!(instructions.phases, vec!["initial", "routes", "final"]);
        assert_eq!(instructions.middleware.len(), 1);
        assert_eq!(instructions.middleware[0].config.phase, "routes");
    }

    #[test]
    fn fragment_resolves_against_module_exports() {
        let instructions = compile(json!({
            "routes": {"helpers#logger": {"params": {"level": "info"}}}
        }))
        .unwrap();
        let entry = &instructions.middleware[0];
        assert_eq!(entry.source_file, PathBuf::from("/modules/helpers.wasm"));
        assert_eq!(entry.fragment.as_deref(), Some("logger"));
    }

    #[test]
    fn fragment_falls_back_to_sub_module_path() {
        let instructions = compile(json!({"routes": {"shell#rest": {}}})).unwrap();
        let entry = &instructions.middleware[0];
        assert_eq!(entry.source_file, PathBuf::from("/modules/shell/rest.wasm"));
        assert!(entry.fragment.is_none());
    }

    #[test]
    fn unresolvable_reference_is_fatal() {
        let err = compile(json!({"routes": {"missing": {}}})).unwrap_err();
        assert!(matches!(err, BootError::Resolution { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn list_entries_expand_to_multiple_instances() {
        let instructions = compile(json!({
            "routes": {"compression": [
                {"name": "a", "params": {"level": 1}},
                {"name": "b", "params": {"level": 9}}
            ]}
        }))
        .unwrap();
        assert_eq!(instructions.middleware.len(), 2);
    }

    #[test]
    fn overlay_may_not_introduce_phases() {
        let mut target = json!({"routes": {"compression": {}}});
        let overlay = ConfigFile {
            path: PathBuf::from("/app/middleware.production.json"),
            data: json!({"final": {"compression": {}}}),
        };
        let err = MiddlewarePlugin.merge_overlay(&mut target, &overlay).unwrap_err();
        assert!(err.to_string().contains("final"));
    }

    #[test]
    fn overlay_may_not_introduce_middleware() {
        let mut target = json!({"routes": {"compression": {}}});
        let overlay = ConfigFile {
            path: PathBuf::from("/app/middleware.production.json"),
            data: json!({"routes": {"body-parser": {}}}),
        };
        let err = MiddlewarePlugin.merge_overlay(&mut target, &overlay).unwrap_err();
        assert!(err.to_string().contains("body-parser"));
    }

    #[test]
    fn overlay_merges_named_list_items() {
        let mut target = json!({"routes": {"compression": [
            {"name": "a", "params": {"level": 1}},
            {"name": "b", "params": {"level": 2}}
        ]}});
        let overlay = ConfigFile {
            path: PathBuf::from("/app/middleware.local.json"),
            data: json!({"routes": {"compression": {"name": "b", "params": {"level": 9}}}}),
        };
        MiddlewarePlugin.merge_overlay(&mut target, &overlay).unwrap();
        assert_eq!(target["routes"]["compression"][1]["params"]["level"], 9);
        assert_eq!(target["routes"]["compression"][0]["params"]["level"], 1);
    }

    #[test]
    fn overlay_list_normalizes_single_object_master() {
        let mut target = json!({"routes": {"compression": {"name": "a", "params": {"level": 1}}}});
        let overlay = ConfigFile {
            path: PathBuf::from("/app/middleware.local.json"),
            data: json!({"routes": {"compression": [
                {"name": "a", "params": {"level": 9}},
                {"name": "b", "params": {"level": 2}}
            ]}}),
        };
        MiddlewarePlugin.merge_overlay(&mut target, &overlay).unwrap();
        let entry = &target["routes"]["compression"];
        assert!(entry.is_array());
        assert_eq!(entry[0]["params"]["level"], 9);
        assert_eq!(entry[1]["name"], "b");
    }

    #[test]
    fn overlay_list_replaces_empty_object_master() {
        let mut target = json!({"routes": {"compression": {}}});
        let overlay = ConfigFile {
            path: PathBuf::from("/app/middleware.local.json"),
            data: json!({"routes": {"compression": [{"name": "a"}]}}),
        };
        MiddlewarePlugin.merge_overlay(&mut target, &overlay).unwrap();
        assert_eq!(target["routes"]["compression"], json!([{"name": "a"}]));
    }

    #[test]
    fn path_markers_become_absolute() {
        let (_, mut ctx) = context();
        ctx.configurations.insert(
            NAME.into(),
            json!({"routes": {"compression": {"paths": ["$!./static", "/verbatim"]}}}),
        );
        MiddlewarePlugin.compile_artifact(&mut ctx).unwrap();
        let instructions: MiddlewareInstructions =
            ctx.typed_instructions(NAME).unwrap().unwrap();
        let paths = instructions.middleware[0].config.paths.as_ref().unwrap();
        let first = paths[0].as_str().unwrap();
        assert!(first.ends_with("static") && !first.starts_with("$!"), "got {first}");
        assert_eq!(paths[1], "/verbatim");
    }

    #[test]
    fn params_markers_resolve_through_nested_structures() {
        let (_, mut ctx) = context();
        ctx.configurations.insert(
            NAME.into(),
            json!({"files": {"compression": {"params": {
                "root": "$!./client",
                "fallbacks": ["$!../shared", {"dir": "$!./public"}],
                "maxAge": 3600
            }}}}),
        );
        MiddlewarePlugin.compile_artifact(&mut ctx).unwrap();
        let instructions: MiddlewareInstructions =
            ctx.typed_instructions(NAME).unwrap().unwrap();
        let params = &instructions.middleware[0].config.params;

        let root = params["root"].as_str().unwrap();
        assert!(root.ends_with("client") && !root.contains("$!"), "got {root}");
        let fallback = params["fallbacks"][0].as_str().unwrap();
        assert!(fallback.ends_with("shared") && !fallback.contains("$!"), "got {fallback}");
        let dir = params["fallbacks"][1]["dir"].as_str().unwrap();
        assert!(dir.ends_with("public") && !dir.contains("$!"), "got {dir}");
        assert_eq!(params["maxAge"], 3600);
    }

    #[test]
    fn only_exact_relative_markers_rewrite() {
        let (_, mut ctx) = context();
        ctx.configurations.insert(
            NAME.into(),
            json!({"routes": {"compression": {"params": {
                "abs": "$!/etc/static",
                "bare": "$!other",
                "real": "$!./static"
            }}}}),
        );
        MiddlewarePlugin.compile_artifact(&mut ctx).unwrap();
        let instructions: MiddlewareInstructions =
            ctx.typed_instructions(NAME).unwrap().unwrap();
        let params = &instructions.middleware[0].config.params;
        assert_eq!(params["abs"], "$!/etc/static");
        assert_eq!(params["bare"], "$!other");
        assert!(!params["real"].as_str().unwrap().contains("$!"));
    }

    #[test]
    fn start_mounts_enabled_and_skips_disabled() {
        let (app, mut ctx) = context();
        ctx.configurations.insert(
            NAME.into(),
            json!({
                "routes": {
                    "compression": {"params": {"level": 6}},
                    "helpers#logger": {"enabled": false}
                }
            }),
        );
        MiddlewarePlugin.compile_artifact(&mut ctx).unwrap();
        MiddlewarePlugin.start(&mut ctx).unwrap();

        let mounted = app.mounted_middleware();
        assert_eq!(mounted.len(), 1);
        assert_eq!(app.middleware_phases(), vec!["routes"]);
        assert_eq!(mounted[0].built["built"]["params"]["level"], 6);
    }
}
