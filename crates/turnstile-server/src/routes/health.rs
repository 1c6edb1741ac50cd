use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use turnstile_core::QueueCounts;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub running_count: usize,
    pub concurrency_ceiling: usize,
    pub subscribers: usize,
    pub tasks: QueueCounts,
}

/// GET /health -- service status plus queue occupancy.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.queue.snapshot().await;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        running_count: snapshot.running_count,
        concurrency_ceiling: snapshot.concurrency_ceiling,
        subscribers: state.queue.subscriber_count().await,
        tasks: snapshot.counts(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
