use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the entire boot pipeline.
#[derive(Error, Debug)]
pub enum BootError {
    // ── Merge errors ───────────────────────────────────────────
    #[error("cannot merge values of incompatible types at `{path}`: {existing} vs {incoming}")]
    MergeTypeMismatch {
        path: String,
        existing: &'static str,
        incoming: &'static str,
    },

    #[error("cannot merge arrays of different lengths at `{path}`: {existing} vs {incoming}")]
    MergeLengthMismatch {
        path: String,
        existing: usize,
        incoming: usize,
    },

    // ── Configuration errors ───────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to parse {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error(
        "unsupported legacy format: model `{model}` declares `{field}` in its config; \
         move it into the model definition file"
    )]
    LegacyFormat { model: String, field: String },

    #[error("invalid mixin normalization: {0}")]
    Normalization(String),

    // ── Compile errors ─────────────────────────────────────────
    #[error("cyclic dependency detected in model inheritance")]
    CyclicDependency,

    #[error("cannot resolve `{reference}`")]
    Resolution {
        reference: String,
        #[source]
        source: anyhow::Error,
    },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BootError>;
