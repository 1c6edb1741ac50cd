//! Dispatch loop and worker units of work.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::JoinHandle;

use crate::config::QueueConfig;
use crate::domain::RegistrationParams;
use crate::ports::{ExecutionError, WorkExecutor};
use crate::queue::{Claim, TaskQueue};

/// Timing knobs the dispatcher needs, lifted out of [`QueueConfig`].
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub ceiling: usize,
    pub cooldown: Duration,
    pub pop_timeout: Duration,
    pub execution_timeout: Option<Duration>,
}

impl From<&QueueConfig> for DispatchSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            ceiling: config.max_concurrent_tasks.max(1),
            cooldown: config.task_cooldown(),
            pop_timeout: config.pop_timeout(),
            execution_timeout: config.execution_timeout(),
        }
    }
}

/// Not yet started dispatcher. [`Dispatcher::spawn`] starts the loop.
pub struct Dispatcher {
    queue: TaskQueue,
    executor: Arc<dyn WorkExecutor>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        queue: TaskQueue,
        executor: Arc<dyn WorkExecutor>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            queue,
            executor,
            settings,
        }
    }

    /// Start the dispatch loop on the current tokio runtime.
    pub fn spawn(self) -> DispatcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let slots = Arc::new(Semaphore::new(self.settings.ceiling));
        let ceiling = self.settings.ceiling;

        let join = tokio::spawn(dispatch_loop(
            self.queue,
            self.executor,
            self.settings,
            Arc::clone(&slots),
            shutdown_rx,
        ));

        DispatcherHandle {
            shutdown_tx,
            join,
            slots,
            ceiling,
        }
    }
}

/// Running dispatcher.
/// - dropping it (or `shutdown_tx`) stops the loop from taking new tasks
/// - `shutdown_and_join()` also waits for in-flight workers and their cooldown
pub struct DispatcherHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
    slots: Arc<Semaphore>,
    ceiling: usize,
}

impl DispatcherHandle {
    /// Stop claiming new tasks. Running workers are left alone.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "dispatch loop ended abnormally");
        }

        // Every worker holds one slot until its cooldown ends.
        match self.slots.acquire_many(self.ceiling as u32).await {
            Ok(_all) => tracing::info!("dispatcher stopped, no task in flight"),
            Err(e) => tracing::error!(error = %e, "worker slots closed early"),
        }
    }
}

async fn dispatch_loop(
    queue: TaskQueue,
    executor: Arc<dyn WorkExecutor>,
    settings: DispatchSettings,
    slots: Arc<Semaphore>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!(ceiling = settings.ceiling, "dispatch loop started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Wait for a free worker slot first so a claim always has somewhere to run.
        let permit = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            permit = Arc::clone(&slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        // next_claim is cancel-safe, so racing it against shutdown never loses a task.
        let claim = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            claim = queue.next_claim(settings.pop_timeout) => claim,
        };

        let Some(claim) = claim else {
            tracing::trace!("no pending task within pop timeout");
            continue;
        };

        tokio::spawn(run_worker(
            queue.clone(),
            Arc::clone(&executor),
            claim,
            permit,
            settings,
        ));
    }

    tracing::info!("dispatch loop stopped");
}

/// One task from `running` to its terminal state, then the cooldown.
async fn run_worker(
    queue: TaskQueue,
    executor: Arc<dyn WorkExecutor>,
    claim: Claim,
    permit: OwnedSemaphorePermit,
    settings: DispatchSettings,
) {
    let Claim { task_id, params } = claim;

    let outcome = execute_guarded(executor, params, settings.execution_timeout).await;
    queue.finish(task_id, outcome).await;

    if !settings.cooldown.is_zero() {
        tokio::time::sleep(settings.cooldown).await;
    }
    drop(permit);
}

/// Runs the executor on its own task so a panic surfaces as a `JoinError`
/// instead of unwinding through the worker.
async fn execute_guarded(
    executor: Arc<dyn WorkExecutor>,
    params: RegistrationParams,
    limit: Option<Duration>,
) -> Result<(), String> {
    let mut handle = tokio::spawn(async move { executor.execute(&params).await });

    let joined = match limit {
        None => (&mut handle).await,
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return Err(ExecutionError::Timeout(limit).to_string());
            }
        },
    };

    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) if e.is_panic() => Err(format!(
            "executor panicked: {}",
            panic_message(e.into_panic())
        )),
        Err(e) => Err(format!("executor aborted: {e}")),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
