//! Crate-wide error type.
//!
//! Nothing in the control path is fatal: callers either get a typed error here
//! (persistence, configuration, thread spawn) or a defined default value.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("i/o failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed parameter artifact {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("shape mismatch in {artifact}: expected {expected}, found {found}")]
    ShapeMismatch {
        artifact: String,
        expected: String,
        found: String,
    },

    #[error("replay buffer holds {available} transitions, {requested} requested")]
    InsufficientSamples { requested: usize, available: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn simulation thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
}

pub type ControlResult<T> = Result<T, ControlError>;
