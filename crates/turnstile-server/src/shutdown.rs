//! Serving with graceful shutdown.
//!
//! Event streams never finish on their own, so the hub is closed as soon as
//! the signal fires. Otherwise the server would wait on them forever while
//! draining connections.

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use turnstile_core::TaskQueue;

/// Serve `router` until `signal` resolves, then end every event stream and
/// drain in-flight requests.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    queue: TaskQueue,
    signal: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signal.await;
            queue.close_subscribers().await;
        })
        .await
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
