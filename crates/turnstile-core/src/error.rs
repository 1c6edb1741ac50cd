use thiserror::Error;

use crate::domain::{TaskId, ValidationError};

/// Errors surfaced synchronously to callers of the queue.
///
/// Execution failures never show up here; they are recorded on the task.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task {0} not found")]
    NotFound(TaskId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
