use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turnstile_core::AppBuilder;
use turnstile_server::config::ServerConfig;
use turnstile_server::executor::build_executor;
use turnstile_server::routes;
use turnstile_server::shutdown;
use turnstile_server::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "turnstile_server=debug,turnstile_core=debug,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid configuration");
    tracing::info!(
        host = %config.host,
        port = config.port,
        ceiling = config.queue.max_concurrent_tasks,
        cooldown_ms = config.queue.task_cooldown_ms,
        "Loaded server configuration"
    );

    // --- Queue + dispatcher ---
    let executor = build_executor(&config.executor).expect("Failed to build executor");
    let app = AppBuilder::new()
        .config(config.queue.clone())
        .executor(executor)
        .build()
        .expect("Failed to build task queue");
    let (queue, dispatcher) = app.start();

    // --- Router ---
    let state = AppState {
        queue: queue.clone(),
        config: Arc::new(config.clone()),
    };
    let router = routes::build_router(state).expect("Invalid CORS configuration");

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    shutdown::serve(listener, router, queue, shutdown::shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining running tasks");
    dispatcher.shutdown_and_join().await;
    tracing::info!("Graceful shutdown complete");
}
