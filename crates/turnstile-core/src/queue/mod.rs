//! Task queue: admission, status reads, subscriptions and claims.

mod state;

pub use state::Claim;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::broadcast::{SubscriberId, Subscription};
use crate::domain::{QueueCounts, QueueSnapshot, RegistrationParams, TaskId, TaskView};
use crate::error::QueueError;
use crate::ports::{Clock, IdGenerator};
use state::QueueState;

struct Shared {
    state: Mutex<QueueState>,
    /// Signalled on admission so an idle dispatcher wakes up.
    notify: Notify,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

/// Handle to the in-memory registration queue.
///
/// Cheap to clone; all clones share one state. Every method takes the lock
/// briefly and never waits on task execution.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Shared>,
}

impl TaskQueue {
    pub fn new(
        ceiling: usize,
        subscriber_buffer: usize,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(QueueState::new(ceiling.max(1), subscriber_buffer)),
                notify: Notify::new(),
                clock,
                ids,
            }),
        }
    }

    /// Admit a registration. Returns as soon as the task is stored.
    ///
    /// Invalid parameters are rejected before anything is stored or broadcast.
    pub async fn submit(&self, params: RegistrationParams) -> Result<TaskId, QueueError> {
        params.validate()?;

        let (task_id, position) = {
            let mut state = self.inner.state.lock().await;
            let mut task_id = self.inner.ids.generate_task_id();
            while state.contains(task_id) {
                task_id = self.inner.ids.generate_task_id();
            }
            let position = state.admit(task_id, params, self.inner.clock.now());
            (task_id, position)
        };

        tracing::info!(task_id = %task_id, position, "task queued");
        self.inner.notify.notify_one();
        Ok(task_id)
    }

    pub async fn status(&self, task_id: TaskId) -> Result<TaskView, QueueError> {
        let state = self.inner.state.lock().await;
        state.view(task_id).ok_or(QueueError::NotFound(task_id))
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    pub async fn counts(&self) -> QueueCounts {
        self.inner.state.lock().await.counts()
    }

    pub async fn running_count(&self) -> usize {
        self.inner.state.lock().await.running_count()
    }

    pub async fn ceiling(&self) -> usize {
        self.inner.state.lock().await.ceiling()
    }

    /// Join the broadcast. The first delivery is the current snapshot.
    ///
    /// `None` only if the snapshot cannot be serialized, which would be a bug.
    pub async fn subscribe(&self) -> Option<Subscription> {
        self.inner.state.lock().await.subscribe()
    }

    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.state.lock().await.unsubscribe(id)
    }

    /// End every open subscription, e.g. when the server shuts down.
    ///
    /// Later subscribers receive the catch-up snapshot and nothing more.
    /// Admission and dispatch are unaffected.
    pub async fn close_subscribers(&self) -> usize {
        let dropped = self.inner.state.lock().await.close_subscribers();
        tracing::info!(dropped, "subscribers closed");
        dropped
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.state.lock().await.subscriber_count()
    }

    /// Claim the next pending task if a running slot is free.
    pub(crate) async fn try_claim(&self) -> Option<Claim> {
        self.inner.state.lock().await.claim_next()
    }

    /// Bounded-wait pop: retries on every admission until `wait` elapses.
    ///
    /// Cancel-safe: a claim happens entirely within one poll after the lock
    /// is acquired, so dropping this future never loses a claimed task.
    pub(crate) async fn next_claim(&self, wait: Duration) -> Option<Claim> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(claim) = self.try_claim().await {
                return Some(claim);
            }
            if tokio::time::timeout_at(deadline, self.inner.notify.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    pub(crate) async fn finish(&self, task_id: TaskId, outcome: Result<(), String>) {
        let at = self.inner.clock.now();
        self.inner.state.lock().await.finish(task_id, outcome, at);
    }
}
