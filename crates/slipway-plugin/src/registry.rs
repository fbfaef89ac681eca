//! In-memory module registry.
//!
//! The default [`ModuleResolver`] implementation for embedders that register
//! their middleware factories, component hooks, and boot scripts up front
//! instead of loading them from an artifact store.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use slipway_core::{
    ComponentHook, MiddlewareFactory, ModuleResolver, ResolvedModule, ScriptHook,
};

#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, ResolvedModule>>,
    factories: RwLock<HashMap<(PathBuf, Option<String>), MiddlewareFactory>>,
    components: RwLock<HashMap<PathBuf, ComponentHook>>,
    scripts: RwLock<HashMap<PathBuf, ScriptHook>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a middleware module resolvable by bare `name`.
    pub fn register_middleware(
        &self,
        name: &str,
        source_file: impl Into<PathBuf>,
        factory: MiddlewareFactory,
    ) {
        let source_file = source_file.into();
        self.modules.write().insert(
            name.to_string(),
            ResolvedModule {
                source_file: source_file.clone(),
                exports: Vec::new(),
            },
        );
        self.factories.write().insert((source_file, None), factory);
    }

    /// Add a named fragment export to an already registered middleware module.
    pub fn register_middleware_fragment(
        &self,
        name: &str,
        fragment: &str,
        factory: MiddlewareFactory,
    ) -> anyhow::Result<()> {
        let mut modules = self.modules.write();
        let module = modules
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("module `{name}` is not registered"))?;
        if !module.exports.iter().any(|e| e == fragment) {
            module.exports.push(fragment.to_string());
        }
        self.factories.write().insert(
            (module.source_file.clone(), Some(fragment.to_string())),
            factory,
        );
        Ok(())
    }

    pub fn register_component(
        &self,
        name: &str,
        source_file: impl Into<PathBuf>,
        hook: ComponentHook,
    ) {
        let source_file = source_file.into();
        self.modules.write().insert(
            name.to_string(),
            ResolvedModule {
                source_file: source_file.clone(),
                exports: Vec::new(),
            },
        );
        self.components.write().insert(source_file, hook);
    }

    /// Boot scripts resolve by file path, not by name.
    pub fn register_boot_script(&self, source_file: impl Into<PathBuf>, hook: ScriptHook) {
        self.scripts.write().insert(source_file.into(), hook);
    }

    fn known_path(&self, path: &Path) -> bool {
        self.factories.read().keys().any(|(p, _)| p == path)
            || self.components.read().contains_key(path)
            || self.scripts.read().contains_key(path)
            || self.modules.read().values().any(|m| m.source_file == path)
    }
}

impl ModuleResolver for ModuleRegistry {
    fn resolve(&self, app_root: &Path, reference: &str) -> anyhow::Result<ResolvedModule> {
        if reference.starts_with("./") || reference.starts_with("../") {
            let path = std::path::absolute(app_root.join(reference))?;
            if !self.known_path(&path) {
                anyhow::bail!("nothing registered at `{}`", path.display());
            }
            let exports = self
                .modules
                .read()
                .values()
                .find(|m| m.source_file == path)
                .map(|m| m.exports.clone())
                .unwrap_or_default();
            return Ok(ResolvedModule {
                source_file: path,
                exports,
            });
        }
        self.modules
            .read()
            .get(reference)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("module `{reference}` is not registered"))
    }

    fn middleware_factory(
        &self,
        source_file: &Path,
        fragment: Option<&str>,
    ) -> anyhow::Result<MiddlewareFactory> {
        let key = (source_file.to_path_buf(), fragment.map(str::to_string));
        self.factories.read().get(&key).cloned().ok_or_else(|| {
            anyhow::anyhow!(
                "no middleware factory registered for `{}`",
                source_file.display()
            )
        })
    }

    fn component_hook(&self, source_file: &Path) -> anyhow::Result<ComponentHook> {
        self.components
            .read()
            .get(source_file)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!("no component registered for `{}`", source_file.display())
            })
    }

    fn boot_script(&self, source_file: &Path) -> anyhow::Result<ScriptHook> {
        self.scripts
            .read()
            .get(source_file)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!("no boot script registered for `{}`", source_file.display())
            })
    }
}
