#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, oneshot};
use tokio::time::Instant;

use turnstile_core::{
    AppBuilder, DispatcherHandle, ExecutionError, QueueConfig, RegistrationParams, TaskId,
    TaskQueue, TaskView, WorkExecutor,
};

/// Fast defaults for scenario tests: no cooldown, short idle wait.
pub fn test_config(ceiling: usize) -> QueueConfig {
    QueueConfig {
        max_concurrent_tasks: ceiling,
        task_cooldown_ms: 0,
        pop_timeout_ms: 20,
        ..QueueConfig::default()
    }
}

pub fn start(
    config: QueueConfig,
    executor: Arc<dyn WorkExecutor>,
) -> (TaskQueue, DispatcherHandle) {
    AppBuilder::new()
        .config(config)
        .executor(executor)
        .build()
        .expect("valid test configuration")
        .start()
}

pub fn params(username: &str) -> RegistrationParams {
    RegistrationParams::new("Test", "User", username, format!("{username}@example.com"))
}

/// Poll `check` every few milliseconds until it returns true or 5s pass.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(Instant::now() < deadline, "timed out waiting for: {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_terminal(queue: &TaskQueue, id: TaskId) -> TaskView {
    eventually("task to finish", || async move {
        queue.status(id).await.unwrap().status.is_terminal()
    })
    .await;
    queue.status(id).await.unwrap()
}

/// Executor whose calls block until the test releases them by username.
///
/// Also tracks how many calls are in flight at once.
#[derive(Default)]
pub struct GatedExecutor {
    gates: Mutex<HashMap<String, oneshot::Sender<Result<(), String>>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: AtomicUsize,
}

impl GatedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Finish the call for `username` once it has started.
    pub async fn release(&self, username: &str, outcome: Result<(), String>) {
        let sender = loop {
            if let Some(tx) = self.gates.lock().await.remove(username) {
                break tx;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        };
        let _ = sender.send(outcome);
    }

    pub async fn is_waiting(&self, username: &str) -> bool {
        self.gates.lock().await.contains_key(username)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkExecutor for GatedExecutor {
    async fn execute(&self, params: &RegistrationParams) -> Result<(), ExecutionError> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.insert(params.username.clone(), tx);

        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = rx.await.unwrap_or_else(|_| Err("gate dropped".to_string()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome.map_err(ExecutionError::Rejected)
    }
}

/// Executor with fixed behavior per username prefix.
pub struct ScriptedExecutor;

#[async_trait]
impl WorkExecutor for ScriptedExecutor {
    async fn execute(&self, params: &RegistrationParams) -> Result<(), ExecutionError> {
        let name = params.username.as_str();
        if name.starts_with("panic") {
            panic!("driver crashed for {name}");
        }
        if name.starts_with("hang") {
            std::future::pending::<()>().await;
        }
        if name.starts_with("fail") {
            return Err(ExecutionError::Rejected(format!("{name} rejected")));
        }
        Ok(())
    }
}
