//! WorkExecutor port - the long-running registration itself.
//!
//! The queue treats the executor as opaque: it may take seconds to minutes and
//! may fail. Panics are caught at the worker boundary and recorded as failures.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::RegistrationParams;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// The registration ran and was refused (bad captcha, taken username, ...).
    #[error("{0}")]
    Rejected(String),

    #[error("timed out after {}", human_duration(.0))]
    Timeout(Duration),

    /// Could not reach the automation backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Whole seconds render as `5s`, anything else as milliseconds (`1500ms`).
fn human_duration(d: &Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

#[async_trait]
pub trait WorkExecutor: Send + Sync {
    async fn execute(&self, params: &RegistrationParams) -> Result<(), ExecutionError>;
}
