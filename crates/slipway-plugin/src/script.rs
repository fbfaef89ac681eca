//! Boot-script plugin.
//!
//! Compilation enumerates script files from the configured boot directories.
//! At start, synchronous hooks run inline; the first asynchronous hook and
//! everything after it is handed back to the scheduler as deferred work, so
//! ordering between scripts is preserved either way.

use std::path::PathBuf;
use tracing::{debug, info};

use slipway_core::{
    BootContext, BootPlugin, HookOutcome, Result, ScriptHook,
};

const NAME: &str = "bootScripts";

pub struct BootScriptPlugin;

impl BootPlugin for BootScriptPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn compile(&self, ctx: &mut BootContext) -> Result<()> {
        let scripts = if let Some(provided) = ctx.options.configs.get(NAME) {
            serde_json::from_value::<Vec<PathBuf>>(provided.clone())?
        } else {
            discover_scripts(ctx)?
        };
        ctx.instructions
            .insert(NAME.to_string(), serde_json::to_value(scripts)?);
        Ok(())
    }

    fn start(&self, ctx: &mut BootContext) -> Result<HookOutcome> {
        let scripts: Vec<PathBuf> = ctx.typed_instructions(NAME)?.unwrap_or_default();
        let mut hooks = Vec::with_capacity(scripts.len());
        for script in &scripts {
            hooks.push((script.clone(), ctx.options.modules.boot_script(script)?));
        }

        let mut pending = hooks.into_iter();
        while let Some((script, hook)) = pending.next() {
            match hook {
                ScriptHook::Sync(run) => {
                    run(&ctx.app)?;
                    info!(script = %script.display(), "boot script completed");
                }
                ScriptHook::Async(run) => {
                    // Everything from here on is deferred so scripts still
                    // execute strictly in order.
                    let app = ctx.app.clone();
                    let rest: Vec<(PathBuf, ScriptHook)> =
                        std::iter::once((script, ScriptHook::Async(run)))
                            .chain(pending)
                            .collect();
                    return Ok(HookOutcome::Deferred(Box::pin(async move {
                        for (script, hook) in rest {
                            match hook {
                                ScriptHook::Sync(run) => run(&app)?,
                                ScriptHook::Async(run) => run(app.clone()).await?,
                            }
                            info!(script = %script.display(), "boot script completed");
                        }
                        Ok(())
                    })));
                }
            }
        }
        Ok(HookOutcome::Done)
    }
}

/// Script files from each boot directory, sorted per directory.
fn discover_scripts(ctx: &BootContext) -> Result<Vec<PathBuf>> {
    let mut scripts = Vec::new();
    for dir in &ctx.options.boot_dirs {
        let dir = if dir.is_absolute() {
            dir.clone()
        } else {
            ctx.options.app_root.join(dir)
        };
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "boot directory does not exist, skipping");
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
        scripts.extend(entries);
    }
    Ok(scripts)
}
