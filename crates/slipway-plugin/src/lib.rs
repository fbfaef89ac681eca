//! # slipway-plugin
//!
//! The built-in boot participants and the named-artifact capability they
//! share. Each plugin owns one configuration slot (application settings, data
//! sources, models, mixins, middleware, components, boot scripts) and
//! contributes hooks to the phases it cares about.

pub mod application;
pub mod base;
pub mod component;
pub mod datasource;
pub mod middleware;
pub mod mixin;
pub mod model;
pub mod registry;
pub mod script;

pub use application::ApplicationPlugin;
pub use base::ArtifactPlugin;
pub use component::ComponentPlugin;
pub use datasource::DataSourcePlugin;
pub use middleware::MiddlewarePlugin;
pub use mixin::MixinPlugin;
pub use model::ModelPlugin;
pub use registry::ModuleRegistry;
pub use script::BootScriptPlugin;

use slipway_core::BootPlugin;
use std::sync::Arc;

/// The built-in plugins in their required registration order: settings and
/// data sources first, then the instruction builders, then execution hooks.
pub fn builtins() -> Vec<Arc<dyn BootPlugin>> {
    vec![
        Arc::new(ApplicationPlugin),
        Arc::new(DataSourcePlugin),
        Arc::new(ModelPlugin),
        Arc::new(MixinPlugin),
        Arc::new(MiddlewarePlugin),
        Arc::new(ComponentPlugin),
        Arc::new(BootScriptPlugin),
    ]
}
