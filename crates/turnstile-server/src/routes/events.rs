use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderName;
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use axum::{Router, routing::get};
use futures::stream::{self, Stream};
use turnstile_core::{Delivery, StreamEvent, SubscriberId, Subscription, TaskQueue};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /events -- server-sent stream of queue snapshots.
///
/// The first event is the current snapshot. After `heartbeat_secs` without a
/// broadcast a `{"type":"heartbeat"}` event is sent instead. The stream ends
/// when the hub drops the subscriber for falling behind or the server shuts
/// down. A client disconnect unsubscribes.
async fn events(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let subscription = state
        .queue
        .subscribe()
        .await
        .ok_or_else(|| AppError::InternalError("could not serialize queue snapshot".into()))?;
    let heartbeat: Arc<str> = StreamEvent::Heartbeat
        .to_json()
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .into();

    tracing::debug!(subscriber = %subscription.id(), "event stream opened");

    let guard = Unsubscribe {
        queue: state.queue.clone(),
        id: subscription.id(),
    };
    let stream = snapshot_stream(
        subscription,
        guard,
        state.config.queue.heartbeat_interval(),
        heartbeat,
    );

    Ok((
        // Keep reverse proxies from buffering the stream.
        [(HeaderName::from_static("x-accel-buffering"), "no")],
        Sse::new(stream),
    ))
}

/// Removes the subscriber from the hub when the stream is dropped.
struct Unsubscribe {
    queue: TaskQueue,
    id: SubscriberId,
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        // Drop cannot await; outside a runtime there is no hub left to clean.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let queue = self.queue.clone();
        let id = self.id;
        runtime.spawn(async move {
            if queue.unsubscribe(id).await {
                tracing::debug!(subscriber = %id, "event stream disconnected");
            }
        });
    }
}

fn snapshot_stream(
    subscription: Subscription,
    guard: Unsubscribe,
    idle: std::time::Duration,
    heartbeat: Arc<str>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((subscription, guard), move |(mut sub, guard)| {
        let heartbeat = Arc::clone(&heartbeat);
        async move {
            let event = match sub.recv_timeout(idle).await {
                Delivery::Snapshot(payload) => Event::default().data(&*payload),
                Delivery::Idle => Event::default().data(&*heartbeat),
                Delivery::Closed => {
                    tracing::debug!(subscriber = %sub.id(), "event stream closed by hub");
                    return None;
                }
            };
            Some((Ok(event), (sub, guard)))
        }
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(events))
}
