use std::sync::Arc;

use turnstile_core::TaskQueue;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the queue is a shared handle and the config sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub queue: TaskQueue,
    pub config: Arc<ServerConfig>,
}
