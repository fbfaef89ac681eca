//! The phase scheduler.
//!
//! A [`Bootstrapper`] holds an ordered list of registered plugins and drives
//! them through the active phase sequence. Within a phase, plugins run in
//! registration order; a deferred hook is awaited before the next plugin
//! runs, so execution order never depends on whether a hook finished inline.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

use slipway_core::{BootContext, BootPlugin, HookOutcome, Result, phase};

#[derive(Clone)]
struct RegisteredPlugin {
    /// Registration path, e.g. `/boot/models`. Used for diagnostics and
    /// prefix filtering.
    path: String,
    plugin: Arc<dyn BootPlugin>,
}

pub struct Bootstrapper {
    plugins: Vec<RegisteredPlugin>,
    /// Only plugins registered under this path prefix are dispatched.
    prefix: String,
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl Bootstrapper {
    /// A scheduler with no plugins registered.
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            prefix: "/boot".to_string(),
        }
    }

    /// A scheduler preloaded with the built-in plugins under `/boot/<name>`.
    pub fn with_builtins() -> Self {
        let mut this = Self::new();
        for plugin in slipway_plugin::builtins() {
            let path = format!("/boot/{}", plugin.name());
            this.register(path, plugin);
        }
        this
    }

    pub fn register(&mut self, path: impl Into<String>, plugin: Arc<dyn BootPlugin>) {
        self.plugins.push(RegisteredPlugin {
            path: path.into(),
            plugin,
        });
    }

    /// Registration paths in order.
    pub fn plugin_paths(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.path.as_str()).collect()
    }

    /// Restrict dispatch to plugins registered under `prefix`.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    fn active_plugins(&self) -> Vec<RegisteredPlugin> {
        self.plugins
            .iter()
            .filter(|p| p.path.starts_with(&self.prefix))
            .cloned()
            .collect()
    }

    /// Run the boot sequence.
    ///
    /// This is deliberately a plain function returning a future: when the
    /// active phases include `starting` or `start`, the application's
    /// `booting` flag is raised before this function returns, so callers
    /// observe it without polling the returned future first.
    pub fn run(&self, mut ctx: BootContext) -> impl Future<Output = Result<BootContext>> + Send {
        let plugins = self.active_plugins();
        let booting = ctx
            .active_phases
            .iter()
            .any(|p| p == phase::STARTING || p == phase::START);
        if booting {
            ctx.app.set_booting(true);
        }
        let ran_started = ctx.active_phases.iter().any(|p| p == phase::STARTED);

        async move {
            let result = execute(&plugins, &mut ctx).await;
            if booting {
                ctx.app.set_booting(false);
            }
            result?;
            if ran_started {
                ctx.app.emit_booted();
            }
            info!(phases = ?ctx.active_phases, "boot sequence complete");
            Ok(ctx)
        }
    }

    /// Run only the synchronous configuration phases (`load` and `compile`),
    /// regardless of the phase list in `ctx`. No application state changes.
    pub fn compile(&self, ctx: &mut BootContext) -> Result<()> {
        for phase_name in [phase::LOAD, phase::COMPILE] {
            for registered in &self.active_plugins() {
                match registered.plugin.hook(phase_name, ctx) {
                    Ok(HookOutcome::Done) => {}
                    Ok(HookOutcome::Deferred(_)) => {
                        debug!(
                            plugin = %registered.path,
                            phase = phase_name,
                            "dropping deferred work from a configuration phase"
                        );
                    }
                    Err(err) => {
                        error!(plugin = %registered.path, phase = phase_name, %err, "boot hook failed");
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }
}

async fn execute(plugins: &[RegisteredPlugin], ctx: &mut BootContext) -> Result<()> {
    for phase_name in ctx.active_phases.clone() {
        debug!(phase = %phase_name, "entering boot phase");
        for registered in plugins {
            let outcome = registered
                .plugin
                .hook(&phase_name, ctx)
                .inspect_err(|err| {
                    error!(plugin = %registered.path, phase = %phase_name, %err, "boot hook failed");
                })?;
            if let HookOutcome::Deferred(rest) = outcome {
                rest.await.inspect_err(|err| {
                    error!(plugin = %registered.path, phase = %phase_name, %err, "deferred boot work failed");
                })?;
            }
        }
    }
    Ok(())
}
