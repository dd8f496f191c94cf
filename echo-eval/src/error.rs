//! Error types for echo-eval
//!
//! Per-reading rejections and per-item configuration failures come from
//! `echo_common`. This module adds the persistence failure and the
//! per-item error reported by the pipeline facade.

use echo_common::{ConfigError, ValidationError};
use std::path::PathBuf;
use thiserror::Error;

/// Failure of the history persistence collaborator
///
/// In-memory history is never affected by these; durability is only
/// guaranteed after a later successful write.
#[derive(Debug, Error)]
pub enum HistoryIoError {
    /// Reading or writing the history file failed
    #[error("History I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// History could not be encoded or decoded
    #[error("History serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HistoryIoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HistoryIoError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of one submitted item
#[derive(Debug, Error)]
pub enum EvalError {
    /// Record could not be built from the submission
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Item cannot be scored with the loaded reference data
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for pipeline operations
pub type EvalResult<T> = Result<T, EvalError>;
