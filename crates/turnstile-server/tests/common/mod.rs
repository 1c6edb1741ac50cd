#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, header::CONTENT_TYPE};
use http_body_util::BodyExt;
use tower::ServiceExt;

use turnstile_core::impls::SimulatedExecutor;
use turnstile_core::{AppBuilder, DispatcherHandle, QueueConfig, TaskQueue, WorkExecutor};
use turnstile_server::config::{ExecutorKind, ServerConfig};
use turnstile_server::routes;
use turnstile_server::state::AppState;

/// Test `ServerConfig`: permissive CORS, no cooldown, short idle waits.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        queue: QueueConfig {
            max_concurrent_tasks: 1,
            task_cooldown_ms: 0,
            pop_timeout_ms: 20,
            heartbeat_secs: 1,
            ..QueueConfig::default()
        },
        executor: ExecutorKind::Simulated { failure_rate: 0.0 },
    }
}

pub struct TestApp {
    pub router: Router,
    pub queue: TaskQueue,
    pub dispatcher: DispatcherHandle,
}

/// Build the full router exactly as `main.rs` does, with an instant executor.
pub fn build_test_app() -> TestApp {
    build_test_app_with(
        test_config(),
        Arc::new(SimulatedExecutor::new(Duration::ZERO, Duration::ZERO, 0.0)),
    )
}

pub fn build_test_app_with(config: ServerConfig, executor: Arc<dyn WorkExecutor>) -> TestApp {
    let (queue, dispatcher) = AppBuilder::new()
        .config(config.queue.clone())
        .executor(executor)
        .build()
        .unwrap()
        .start();

    let state = AppState {
        queue: queue.clone(),
        config: Arc::new(config),
    };
    TestApp {
        router: routes::build_router(state).unwrap(),
        queue,
        dispatcher,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_form(app: Router, uri: &str, form: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub const VALID_FORM: &str =
    "first_name=Ada&last_name=Lovelace&username=ada&email=ada%40example.com";
