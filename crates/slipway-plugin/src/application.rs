//! Application settings plugin (`config.json` + overlays).

use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::info;

use crate::base::ArtifactPlugin;
use slipway_core::{BootContext, BootPlugin, HookOutcome, Result};
use slipway_config::{host_spec, port_spec, resolve_setting};

const NAME: &str = "application";

pub struct ApplicationPlugin;

impl ArtifactPlugin for ApplicationPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config_name(&self) -> &str {
        "config"
    }
}

impl BootPlugin for ApplicationPlugin {
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
        let config: Map<String, Value> = ctx
            .instructions
            .get(NAME)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let empty = HashMap::new();
        let env = ctx.options.env_vars.as_ref().unwrap_or(&empty);

        if let Some(port) =
            resolve_setting(&port_spec(), env, config.get("port"), ctx.app.get("port"))
        {
            ctx.app.set("port", port);
        }
        if let Some(host) =
            resolve_setting(&host_spec(), env, config.get("host"), ctx.app.get("host"))
        {
            ctx.app.set("host", host);
        }

        let rest_api_root = config
            .get("restApiRoot")
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| ctx.app.get("restApiRoot"))
            .unwrap_or_else(|| json!("/api"));
        ctx.app.set("restApiRoot", rest_api_root);

        for (key, value) in &config {
            if matches!(key.as_str(), "port" | "host" | "restApiRoot") {
                continue;
            }
            ctx.app.set(key, value.clone());
        }

        info!(
            host = ?ctx.app.get("host"),
            port = ?ctx.app.get("port"),
            "applied application settings"
        );
        Ok(HookOutcome::Done)
    }
}
