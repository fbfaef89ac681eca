//! Config file resolution and loading.
//!
//! A logical config name resolves to an ordered candidate set: the required
//! `<name>.json` master, then `<name>.local.*`, then `<name>.<env>.*`
//! overlays. Loaded data travels as a [`ConfigFile`] pairing so the origin
//! path is available for error reporting without touching the data itself.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::merge::merge_values;
use slipway_core::{BootError, Result};

/// Overlay extensions in preference order; the first one found wins.
const OVERLAY_EXTENSIONS: [&str; 2] = ["json", "toml"];

/// A loaded configuration file: the parsed data plus its origin path.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub data: Value,
}

/// Find the ordered candidate file set for `name` under `root`.
///
/// Without the `<name>.json` master the result is empty; overlays found in
/// that situation are reported and ignored.
pub fn find_config_files(root: &Path, env: &str, name: &str) -> Vec<PathBuf> {
    let master = root.join(format!("{name}.json"));
    let overlays = [format!("{name}.local"), format!("{name}.{env}")];

    if !master.is_file() {
        for stem in &overlays {
            if let Some(orphan) = first_existing(root, stem) {
                warn!(
                    file = %orphan.display(),
                    "ignoring config override: no {name}.json master file"
                );
            }
        }
        return Vec::new();
    }

    let mut files = vec![master];
    for stem in &overlays {
        if let Some(path) = first_existing(root, stem) {
            files.push(path);
        }
    }
    files
}

fn first_existing(root: &Path, stem: &str) -> Option<PathBuf> {
    OVERLAY_EXTENSIONS
        .iter()
        .map(|ext| root.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

/// Parse a single config file (JSON or TOML by extension).
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)?;
    let data = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str::<Value>(&raw).map_err(|e| BootError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?,
        _ => serde_json::from_str(&raw).map_err(|e| BootError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?,
    };
    debug!(file = %path.display(), "loaded config file");
    Ok(ConfigFile {
        path: path.to_path_buf(),
        data,
    })
}

/// Merge-reduce loaded files left to right. The first file's data is cloned
/// as the accumulator; a conflict surfaces the merge error unchanged after
/// naming the offending overlay in the log.
pub fn merge_config_files(files: &[ConfigFile]) -> Result<Value> {
    let Some((first, rest)) = files.split_first() else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let mut merged = first.data.clone();
    for file in rest {
        if let Err(err) = merge_values(&mut merged, &file.data, "") {
            warn!(file = %file.path.display(), "config overlay failed to merge");
            return Err(err);
        }
    }
    Ok(merged)
}

/// Resolve, load, and merge the config files for `name`.
/// Returns `None` when no master file exists.
pub fn load_named(root: &Path, env: &str, name: &str) -> Result<Option<Value>> {
    let paths = find_config_files(root, env, name);
    if paths.is_empty() {
        return Ok(None);
    }
    let files = paths
        .iter()
        .map(|path| load_config_file(path))
        .collect::<Result<Vec<_>>>()?;
    merge_config_files(&files).map(Some)
}
