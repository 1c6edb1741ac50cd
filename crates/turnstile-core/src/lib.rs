//! turnstile-core
//!
//! In-memory registration queue with a concurrency ceiling, live queue
//! positions and snapshot broadcasting to streaming subscribers.
//!
//! # Modules
//! - **domain**: ids, registration parameters, task status, records, snapshots
//! - **ports**: seams (Clock, IdGenerator, WorkExecutor)
//! - **queue**: `TaskQueue`, the single owner of task state
//! - **broadcast**: `BroadcastHub` and per-subscriber channels
//! - **app**: `AppBuilder` and the background dispatcher
//! - **impls**: executors (remote automation service, simulated)
//! - **config**: `QueueConfig`
//! - **error**: library error types

pub mod app;
pub mod broadcast;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod queue;

pub use app::{App, AppBuilder, BuildError, DispatcherHandle};
pub use broadcast::{Delivery, SubscriberId, Subscription};
pub use config::QueueConfig;
pub use domain::{
    QueueCounts, QueueSnapshot, RegistrationParams, StreamEvent, TaskId, TaskStatus, TaskView,
    ValidationError,
};
pub use error::{ConfigError, QueueError};
pub use ports::{ExecutionError, WorkExecutor};
pub use queue::TaskQueue;
