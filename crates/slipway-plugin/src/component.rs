//! Component plugin (`component-config.json` + overlays).

use serde_json::Value;
use tracing::{debug, info};

use crate::base::ArtifactPlugin;
use slipway_core::{
    BootContext, BootError, BootPlugin, ComponentEntry, HookOutcome, Result,
};
use std::path::Path;

const NAME: &str = "components";

pub struct ComponentPlugin;

impl ArtifactPlugin for ComponentPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config_name(&self) -> &str {
        "component-config"
    }

    fn build_instructions(
        &self,
        ctx: &BootContext,
        root: &Path,
        config: &Value,
    ) -> Result<Option<Value>> {
        let mut entries: Vec<ComponentEntry> = Vec::new();
        for (reference, component_config) in config.as_object().into_iter().flatten() {
            // `false`/`null` disables a component without deleting its entry.
            if component_config.is_null() || component_config == &Value::Bool(false) {
                debug!(component = %reference, "component disabled, skipping");
                continue;
            }
            let resolved = ctx
                .options
                .modules
                .resolve(root, reference)
                .map_err(|source| BootError::Resolution {
                    reference: reference.clone(),
                    source,
                })?;
            entries.push(ComponentEntry {
                source_file: resolved.source_file,
                config: component_config.clone(),
            });
        }
        Ok(Some(serde_json::to_value(entries)?))
    }
}

impl BootPlugin for ComponentPlugin {
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
        let entries: Vec<ComponentEntry> = ctx.typed_instructions(NAME)?.unwrap_or_default();
        for entry in &entries {
            let hook = ctx.options.modules.component_hook(&entry.source_file)?;
            hook(&ctx.app, &entry.config)?;
            info!(component = %entry.source_file.display(), "component configured");
        }
        Ok(HookOutcome::Done)
    }
}
