//! The named-artifact capability every built-in plugin specializes.
//!
//! Load: find this plugin's config (in-memory object or resolved files),
//! merge, and store it into the configuration bag. Compile: hand the raw
//! config to the plugin's `build_instructions` specializer, or store it
//! verbatim when the plugin has none.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use slipway_config::{ConfigFile, find_config_files, load_config_file, merge_values};
use slipway_core::{BootContext, Result};

pub trait ArtifactPlugin: Send + Sync {
    /// Slot name in the configuration bag / instructions, e.g. `models`.
    fn name(&self) -> &'static str;

    /// Logical config file name (`model-config` for the `models` slot).
    fn config_name(&self) -> &str {
        self.name()
    }

    /// Root directory for this plugin's config files.
    fn root_dir(&self, ctx: &BootContext) -> PathBuf {
        ctx.options.app_root.clone()
    }

    /// Configuration used when neither files nor an in-memory object exist.
    fn default_config(&self) -> Value {
        Value::Object(Map::new())
    }

    /// Merge one overlay file onto the accumulator. The middleware plugin
    /// overrides this with its list-aware semantics.
    fn merge_overlay(&self, target: &mut Value, overlay: &ConfigFile) -> Result<()> {
        merge_values(target, &overlay.data, "")
    }

    /// Transform raw configuration into normalized instructions. `None`
    /// means the instructions equal the raw configuration verbatim.
    fn build_instructions(
        &self,
        _ctx: &BootContext,
        _root: &Path,
        _config: &Value,
    ) -> Result<Option<Value>> {
        Ok(None)
    }

    // ── Provided phase behavior ────────────────────────────────

    fn load_artifact(&self, ctx: &mut BootContext) -> Result<()> {
        let name = self.name();
        let config = if let Some(provided) = ctx.options.configs.get(name) {
            debug!(plugin = name, "using caller-supplied in-memory configuration");
            provided.clone()
        } else {
            let root = self.root_dir(ctx);
            let paths = find_config_files(&root, &ctx.options.env, self.config_name());
            let mut merged: Option<Value> = None;
            for path in &paths {
                let file = load_config_file(path)?;
                match merged.as_mut() {
                    // The first file's data is cloned as the accumulator;
                    // overlays merge onto it in place.
                    None => merged = Some(file.data.clone()),
                    Some(acc) => {
                        self.merge_overlay(acc, &file).inspect_err(|_| {
                            warn!(
                                plugin = name,
                                file = %file.path.display(),
                                "config overlay failed to merge"
                            );
                        })?;
                    }
                }
            }
            merged.unwrap_or_else(|| self.default_config())
        };
        ctx.configurations.insert(name.to_string(), config);
        Ok(())
    }

    fn compile_artifact(&self, ctx: &mut BootContext) -> Result<()> {
        let name = self.name();
        let config = ctx
            .configurations
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.default_config());
        let root = self.root_dir(ctx);
        let instructions = match self.build_instructions(ctx, &root, &config)? {
            Some(instructions) => instructions,
            None => config,
        };
        ctx.instructions.insert(name.to_string(), instructions);
        Ok(())
    }
}
