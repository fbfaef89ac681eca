//! # slipway-core
//!
//! Core types, traits, and primitives for the slipway boot pipeline.
//! This crate defines the shared vocabulary used by every other crate in the
//! workspace: the error type, the application-collaborator seam, the plugin
//! trait, and the per-run boot context.

pub mod app;
pub mod context;
pub mod error;
pub mod memory;
pub mod phase;
pub mod plugin;
pub mod types;

pub use app::{
    AppHandle, Application, ComponentHook, MiddlewareFactory, ModelRegistry, ModuleResolver,
    NullResolver, ResolvedModule, ScriptHook,
};
pub use context::{BootContext, BootOptions, Normalization};
pub use error::{BootError, Result};
pub use memory::{InMemoryApplication, MountedMiddleware};
pub use plugin::{BootPlugin, HookOutcome};
pub use types::*;
