pub mod events;
pub mod health;
pub mod register;
pub mod tasks;

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use turnstile_core::ConfigError;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the full application router with its middleware stack.
///
/// Shared by `main.rs` and the integration tests so both exercise the same
/// layers (request ID, timeout, tracing, panic recovery, and CORS on
/// `/register` and `/task/{task_id}`).
pub fn build_router(state: AppState) -> Result<Router, ConfigError> {
    let cors = build_cors_layer(&state.config)?;
    let request_id_header = HeaderName::from_static("x-request-id");

    // CORS covers the form API only, as the web client posts cross-origin.
    let api = Router::new()
        .merge(register::router())
        .merge(tasks::router())
        .layer(cors);

    Ok(Router::new()
        .merge(api)
        .merge(health::router())
        .merge(events::router())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        // Bounds the time to response headers only; event streams stay open.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(state.config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state))
}

/// `*` allows any origin, header and method, as the web form expects.
fn build_cors_layer(config: &ServerConfig) -> Result<CorsLayer, ConfigError> {
    if config.allows_any_origin() {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origins = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "CORS_ORIGINS".into(),
                    value: o.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600)))
}
