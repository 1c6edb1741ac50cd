use std::sync::Arc;
use std::time::Duration;

use turnstile_core::impls::{RemoteExecutor, SimulatedExecutor};
use turnstile_core::{ExecutionError, WorkExecutor};

use crate::config::ExecutorKind;

/// Build the executor selected by configuration.
pub fn build_executor(kind: &ExecutorKind) -> Result<Arc<dyn WorkExecutor>, ExecutionError> {
    match kind {
        ExecutorKind::Simulated { failure_rate } => {
            tracing::info!(failure_rate, "using simulated executor");
            Ok(Arc::new(SimulatedExecutor::new(
                Duration::from_secs(2),
                Duration::from_secs(8),
                *failure_rate,
            )))
        }
        ExecutorKind::Remote { url, timeout } => {
            tracing::info!(url = %url, timeout_secs = timeout.as_secs(), "using remote executor");
            Ok(Arc::new(RemoteExecutor::new(url.clone(), *timeout)?))
        }
    }
}
