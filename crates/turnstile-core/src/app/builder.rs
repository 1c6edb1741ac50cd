//! AppBuilder - wiring and start-up validation.
//!
//! Fail fast: a bad configuration or a missing executor is reported by
//! `build()`, before any task can be admitted.

use std::sync::Arc;

use crate::app::dispatcher::{DispatchSettings, Dispatcher, DispatcherHandle};
use crate::config::QueueConfig;
use crate::error::ConfigError;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator, WorkExecutor};
use crate::queue::TaskQueue;

/// Builds an [`App`].
///
/// ```ignore
/// let app = AppBuilder::new()
///     .config(QueueConfig::default())
///     .executor(Arc::new(SimulatedExecutor::default()))
///     .build()?;
/// let (queue, dispatcher) = app.start();
/// ```
pub struct AppBuilder {
    config: QueueConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    executor: Option<Arc<dyn WorkExecutor>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid queue configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("no work executor configured; call AppBuilder::executor before build")]
    MissingExecutor,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
            clock: None,
            ids: None,
            executor: None,
        }
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to a [`UlidGenerator`] over the system clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn WorkExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        self.config.validate()?;
        let executor = self.executor.ok_or(BuildError::MissingExecutor)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));

        let queue = TaskQueue::new(
            self.config.max_concurrent_tasks,
            self.config.subscriber_buffer,
            clock,
            ids,
        );
        let dispatcher = Dispatcher::new(
            queue.clone(),
            executor,
            DispatchSettings::from(&self.config),
        );

        Ok(App {
            config: self.config,
            queue,
            dispatcher,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wired application, not yet running.
pub struct App {
    config: QueueConfig,
    queue: TaskQueue,
    dispatcher: Dispatcher,
}

impl App {
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Spawn the dispatch loop. Must be called inside a tokio runtime.
    pub fn start(self) -> (TaskQueue, DispatcherHandle) {
        let handle = self.dispatcher.spawn();
        (self.queue, handle)
    }
}
