use futures::future::BoxFuture;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Result;
use crate::types::{MiddlewareEntry, ModelRecord};

/// Shared handle to the application collaborator being booted.
pub type AppHandle = Arc<dyn Application>;

/// The application collaborator driven by the boot pipeline.
///
/// The pipeline only calls these opaque registration functions; the runtime
/// behind them (model system, data-source connectors, middleware chaining)
/// is out of scope.
pub trait Application: Send + Sync {
    /// Read a named setting.
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a named setting.
    fn set(&self, key: &str, value: Value);

    /// Register a data source under `name`.
    fn register_data_source(&self, name: &str, config: Value) -> Result<()>;

    /// Register visibility/configuration for an already-created model.
    fn attach_model(&self, name: &str, config: Value) -> Result<()>;

    /// The model registry backing `create_model`/mixin registration.
    fn models(&self) -> &dyn ModelRegistry;

    /// Declare the ordered middleware phase list.
    fn define_middleware_phases(&self, phases: &[String]) -> Result<()>;

    /// Build a middleware instance from `factory` and mount it.
    fn mount_middleware(&self, factory: MiddlewareFactory, entry: &MiddlewareEntry) -> Result<()>;

    /// Flag flipped by the scheduler for the duration of a boot run that
    /// includes a `starting` or `start` phase.
    fn set_booting(&self, booting: bool);

    fn booting(&self) -> bool;

    /// One-shot notification emitted once the `started` phase completes.
    fn emit_booted(&self);
}

/// Model registry accessor exposed by the application collaborator.
pub trait ModelRegistry: Send + Sync {
    fn has_model(&self, name: &str) -> bool;

    /// Create the model type from a compiled record (definition required).
    fn create_model(&self, record: &ModelRecord) -> Result<()>;

    fn register_mixin(&self, name: &str, source_file: &Path) -> Result<()>;
}

/// A module reference resolved to its backing file.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub source_file: PathBuf,
    /// Named exports usable as `#fragment` selectors.
    pub exports: Vec<String>,
}

/// Builds a middleware instance from its configuration. The returned value is
/// opaque to the pipeline; the application decides what to do with it.
pub type MiddlewareFactory = Arc<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

/// Invoked at start with the application and the component's config.
pub type ComponentHook = Arc<dyn Fn(&AppHandle, &Value) -> anyhow::Result<()> + Send + Sync>;

/// A boot script hook. The two shapes mirror the two supported script styles:
/// a synchronous hook runs inline and boot proceeds as soon as it returns, an
/// asynchronous hook is awaited before the boot sequence advances.
#[derive(Clone)]
pub enum ScriptHook {
    Sync(Arc<dyn Fn(&AppHandle) -> anyhow::Result<()> + Send + Sync>),
    Async(Arc<dyn Fn(AppHandle) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>),
}

/// Host module-resolution mechanism. Middleware references, components, and
/// boot scripts all resolve through this seam; the default in-memory registry
/// lives in `slipway-plugin`.
pub trait ModuleResolver: Send + Sync {
    /// Resolve a module reference (bare name or `./relative` path) to its
    /// backing file. Relative references resolve against `app_root`.
    fn resolve(&self, app_root: &Path, reference: &str) -> anyhow::Result<ResolvedModule>;

    /// Retrieve the middleware factory behind a previously resolved file,
    /// optionally selecting a named fragment export.
    fn middleware_factory(
        &self,
        source_file: &Path,
        fragment: Option<&str>,
    ) -> anyhow::Result<MiddlewareFactory>;

    fn component_hook(&self, source_file: &Path) -> anyhow::Result<ComponentHook>;

    fn boot_script(&self, source_file: &Path) -> anyhow::Result<ScriptHook>;
}

/// Resolver used when the caller never configured one: every lookup fails.
pub struct NullResolver;

impl ModuleResolver for NullResolver {
    fn resolve(&self, _app_root: &Path, reference: &str) -> anyhow::Result<ResolvedModule> {
        anyhow::bail!("no module resolver configured (looking up `{reference}`)")
    }

    fn middleware_factory(
        &self,
        source_file: &Path,
        _fragment: Option<&str>,
    ) -> anyhow::Result<MiddlewareFactory> {
        anyhow::bail!(
            "no module resolver configured (looking up `{}`)",
            source_file.display()
        )
    }

    fn component_hook(&self, source_file: &Path) -> anyhow::Result<ComponentHook> {
        anyhow::bail!(
            "no module resolver configured (looking up `{}`)",
            source_file.display()
        )
    }

    fn boot_script(&self, source_file: &Path) -> anyhow::Result<ScriptHook> {
        anyhow::bail!(
            "no module resolver configured (looking up `{}`)",
            source_file.display()
        )
    }
}
