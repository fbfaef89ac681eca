//! Mixin plugin.
//!
//! Scans the configured mixin directories, normalizes file stems into mixin
//! names, and keeps only the mixins that at least one compiled model
//! references. Runs after the model plugin so the model instructions exist.

use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::base::ArtifactPlugin;
use slipway_core::{
    BootContext, BootPlugin, HookOutcome, MixinRecord, ModelRecord, Normalization, Result,
};

const NAME: &str = "mixins";

pub struct MixinPlugin;

impl ArtifactPlugin for MixinPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn build_instructions(
        &self,
        ctx: &BootContext,
        root: &Path,
        config: &Value,
    ) -> Result<Option<Value>> {
        let records = build_mixin_instructions(ctx, root, config)?;
        Ok(Some(serde_json::to_value(records)?))
    }
}

impl BootPlugin for MixinPlugin {
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
        let records: Vec<MixinRecord> = ctx.typed_instructions(NAME)?.unwrap_or_default();
        for record in &records {
            ctx.app.models().register_mixin(&record.name, &record.source_file)?;
        }
        info!(count = records.len(), "mixins registered");
        Ok(HookOutcome::Done)
    }
}

fn build_mixin_instructions(
    ctx: &BootContext,
    root: &Path,
    config: &Value,
) -> Result<Vec<MixinRecord>> {
    let referenced = referenced_mixins(ctx)?;
    if referenced.is_empty() {
        return Ok(Vec::new());
    }

    let normalization = match config.get("normalization") {
        Some(value) => Normalization::from_config(Some(value))?,
        None => ctx.options.normalization.clone(),
    };

    let mut records: Vec<MixinRecord> = Vec::new();
    for file in candidate_files(ctx, root)? {
        let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let name = normalization.apply(stem);
        if !referenced.contains(&name) {
            debug!(mixin = %name, "mixin not referenced by any model, skipping");
            continue;
        }
        if let Some(existing) = records.iter().find(|r| r.name == name) {
            warn!(
                mixin = %name,
                kept = %existing.source_file.display(),
                ignored = %file.display(),
                "duplicate mixin name, keeping first occurrence"
            );
            continue;
        }
        records.push(MixinRecord { name, source_file: file });
    }

    for name in &referenced {
        if !records.iter().any(|r| &r.name == name) {
            warn!(mixin = %name, "referenced mixin not found in any mixin directory");
        }
    }
    Ok(records)
}

/// Mixin names referenced by at least one compiled model definition.
fn referenced_mixins(ctx: &BootContext) -> Result<BTreeSet<String>> {
    let models: Vec<ModelRecord> = ctx.typed_instructions("models")?.unwrap_or_default();
    let mut referenced = BTreeSet::new();
    for model in &models {
        let names = model
            .definition
            .as_ref()
            .and_then(|d| d.get("mixins"))
            .and_then(Value::as_object);
        if let Some(mixins) = names {
            referenced.extend(mixins.keys().cloned());
        }
    }
    Ok(referenced)
}

/// Explicit files first, then directory scans in declaration order.
fn candidate_files(ctx: &BootContext, root: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = ctx
        .options
        .mixin_files
        .iter()
        .map(|f| absolutize(root, f))
        .collect();

    let mut dirs: Vec<PathBuf> = ctx.options.mixin_dirs.clone();
    let meta_dirs = ctx
        .configurations
        .get("models")
        .and_then(|c| c.get("_meta"))
        .and_then(|meta| meta.get("mixins"))
        .and_then(Value::as_array);
    if let Some(meta_dirs) = meta_dirs {
        dirs.extend(meta_dirs.iter().filter_map(Value::as_str).map(PathBuf::from));
    }

    for dir in dirs {
        let dir = absolutize(root, &dir);
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "mixin directory does not exist, skipping");
            continue;
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| ctx.options.module_extensions.iter().any(|m| m == ext))
            })
            .collect();
        entries.sort();
        files.extend(entries);
    }
    Ok(files)
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
