use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::app::{AppHandle, ModuleResolver, NullResolver};
use crate::types::ModelDefinition;
use crate::{BootError, Result, phase};

/// Mixin file-name normalization mode.
#[derive(Clone, Default)]
pub enum Normalization {
    /// Strip non-alphanumerics and capitalize word boundaries (`TitleCase`).
    #[default]
    Classify,
    /// Lowercase `dash-case`.
    Dasherize,
    /// Keep the file stem verbatim.
    Verbatim,
    /// Caller-supplied normalization function.
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl Normalization {
    /// Parse the configured mode. `true`/absent selects the default,
    /// `false` disables normalization; anything unrecognized is fatal.
    pub fn from_config(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Bool(true)) => Ok(Self::Classify),
            Some(Value::Bool(false)) => Ok(Self::Verbatim),
            Some(Value::String(mode)) => match mode.as_str() {
                "classify" => Ok(Self::Classify),
                "dasherize" => Ok(Self::Dasherize),
                "none" => Ok(Self::Verbatim),
                other => Err(BootError::Normalization(other.to_string())),
            },
            Some(other) => Err(BootError::Normalization(other.to_string())),
        }
    }

    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::Classify => classify(name),
            Self::Dasherize => dasherize(name),
            Self::Verbatim => name.to_string(),
            Self::Custom(f) => f(name),
        }
    }
}

/// `"time-stamps"` / `"time_stamps"` / `"TimeStamps"` → `"TimeStamps"`.
fn classify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if upper_next {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    out
}

/// `"TimeStamps"` / `"time_stamps"` → `"time-stamps"`.
fn dasherize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_alnum = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_alnum {
                out.push('-');
            }
            out.extend(c.to_lowercase());
            prev_alnum = true;
        } else if prev_alnum {
            out.push('-');
            prev_alnum = false;
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Caller-facing knobs for one boot run.
#[derive(Clone)]
pub struct BootOptions {
    /// Application root; config files and relative references resolve here.
    pub app_root: PathBuf,
    /// Environment name selecting `<name>.<env>.*` overlays.
    pub env: String,
    /// Replacement phase list; `None` selects the built-in sequence.
    pub phases: Option<Vec<String>>,
    /// In-memory configurations by plugin name. A plugin that finds its name
    /// here skips file I/O entirely.
    pub configs: Map<String, Value>,
    /// Explicit environment snapshot for `${VAR}` interpolation and
    /// host/port resolution. `None` disables environment lookups.
    pub env_vars: Option<HashMap<String, String>>,
    /// Host module-resolution mechanism.
    pub modules: Arc<dyn ModuleResolver>,
    /// Explicit model definitions, bypassing directory scanning.
    pub model_definitions: Vec<ModelDefinition>,
    /// Model definition source directories (overrides `_meta.sources`).
    pub model_sources: Vec<PathBuf>,
    /// Base models known to exist outside the discovered registry.
    pub external_models: HashSet<String>,
    /// Explicit mixin files.
    pub mixin_files: Vec<PathBuf>,
    /// Mixin source directories.
    pub mixin_dirs: Vec<PathBuf>,
    pub normalization: Normalization,
    /// Boot script directories, relative to the app root.
    pub boot_dirs: Vec<PathBuf>,
    /// File extensions treated as loadable modules during discovery.
    pub module_extensions: Vec<String>,
}

impl Default for BootOptions {
    fn default() -> Self {
        Self {
            app_root: PathBuf::from("."),
            env: "development".into(),
            phases: None,
            configs: Map::new(),
            env_vars: None,
            modules: Arc::new(NullResolver),
            model_definitions: Vec::new(),
            model_sources: Vec::new(),
            external_models: HashSet::new(),
            mixin_files: Vec::new(),
            mixin_dirs: Vec::new(),
            normalization: Normalization::default(),
            boot_dirs: vec![PathBuf::from("boot")],
            module_extensions: vec!["wasm".into()],
        }
    }
}

impl BootOptions {
    pub fn new(app_root: impl Into<PathBuf>) -> Self {
        Self {
            app_root: app_root.into(),
            ..Self::default()
        }
    }
}

/// Per-run mutable record threaded through every phase. Created fresh per
/// boot invocation and returned to the caller afterwards.
pub struct BootContext {
    pub app: AppHandle,
    pub options: BootOptions,
    /// Plugin name → raw merged configuration.
    pub configurations: Map<String, Value>,
    /// Plugin name → normalized, execution-ready instructions.
    pub instructions: Map<String, Value>,
    /// The active phase list for this run.
    pub active_phases: Vec<String>,
    /// Free-form scratch state plugins may add to.
    pub scratch: Map<String, Value>,
}

impl BootContext {
    pub fn new(app: AppHandle, options: BootOptions) -> Self {
        let active_phases = options
            .phases
            .clone()
            .unwrap_or_else(phase::default_phases);
        Self {
            app,
            options,
            configurations: Map::new(),
            instructions: Map::new(),
            active_phases,
            scratch: Map::new(),
        }
    }

    /// Deserialize a plugin's instruction slot, if present.
    pub fn typed_instructions<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Option<T>> {
        match self.instructions.get(name) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}
