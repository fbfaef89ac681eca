//! Data source plugin (`datasources.json` + overlays).

use serde_json::Value;
use tracing::{info, warn};

use crate::base::ArtifactPlugin;
use slipway_core::{BootContext, BootPlugin, HookOutcome, Result};
use slipway_config::{VarLookup, resolve_variables};

const NAME: &str = "dataSources";

pub struct DataSourcePlugin;

impl ArtifactPlugin for DataSourcePlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config_name(&self) -> &str {
        "datasources"
    }
}

impl BootPlugin for DataSourcePlugin {
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
        let Some(config) = ctx.instructions.get(NAME).and_then(Value::as_object).cloned()
        else {
            return Ok(HookOutcome::Done);
        };

        let app = ctx.app.clone();
        let getter = |key: &str| app.get(key);
        let lookup = VarLookup {
            env: ctx.options.env_vars.as_ref(),
            app: &getter,
        };

        for (name, ds_config) in config {
            if name == "_meta" {
                continue;
            }
            if !ds_config.is_object() {
                warn!(data_source = %name, "skipping non-object data source config");
                continue;
            }
            let mut resolved = ds_config.clone();
            resolve_variables(&mut resolved, &lookup);
            ctx.app.register_data_source(&name, resolved)?;
            info!(data_source = %name, "registered data source");
        }
        Ok(HookOutcome::Done)
    }
}
