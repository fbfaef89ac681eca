//! # slipway-config
//!
//! Layered configuration handling for the boot pipeline: strict deep
//! merging, config-file resolution (`name.json` + `name.local.*` +
//! `name.<env>.*`), `${VAR}` interpolation, and host/port precedence
//! resolution.

pub mod files;
pub mod interpolate;
pub mod merge;
pub mod netconfig;

pub use files::{ConfigFile, find_config_files, load_config_file, load_named, merge_config_files};
pub use interpolate::{VarLookup, resolve_variables};
pub use merge::merge_values;
pub use netconfig::{SettingSpec, host_spec, port_spec, resolve_setting};
