//! # slipway-runtime
//!
//! The phase scheduler plus the two top-level entry points: [`boot`] runs
//! the full pipeline against an application, [`compile`] runs only the
//! configuration phases and hands back the compiled instructions.

pub mod bootstrap;

pub use bootstrap::Bootstrapper;
pub use slipway_core::{
    AppHandle, BootContext, BootError, BootOptions, BootPlugin, HookOutcome,
    InMemoryApplication, Result, phase,
};
pub use slipway_plugin::ModuleRegistry;

use serde_json::{Map, Value};

/// Boot `app` with the built-in plugins.
///
/// Callers that need to observe the `booting` flag before the first await
/// point should call [`Bootstrapper::run`] directly; the returned future
/// carries that guarantee, an `async fn` cannot.
pub async fn boot(app: AppHandle, options: BootOptions) -> Result<BootContext> {
    Bootstrapper::with_builtins()
        .run(BootContext::new(app, options))
        .await
}

/// Run only `load` and `compile` and return the compiled instructions.
/// Nothing touches the application, so a throwaway in-memory one is used.
pub fn compile(options: BootOptions) -> Result<Map<String, Value>> {
    let app = std::sync::Arc::new(InMemoryApplication::new());
    let mut ctx = BootContext::new(app, options);
    Bootstrapper::with_builtins().compile(&mut ctx)?;
    Ok(ctx.instructions)
}
