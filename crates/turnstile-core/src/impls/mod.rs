//! Impls - WorkExecutor implementations.
//!
//! - **RemoteExecutor**: production, calls the browser-automation service
//! - **SimulatedExecutor**: development and demos, random latency and failures

pub mod remote;
pub mod simulated;

pub use self::remote::{DEFAULT_REQUEST_TIMEOUT, RemoteExecutor};
pub use self::simulated::SimulatedExecutor;
