//! App layer: wiring plus the background dispatch loop.
//!
//! - **AppBuilder**: validates configuration and wires queue, executor and ports
//! - **Dispatcher**: promotes pending tasks to running as worker slots free up

pub mod builder;
pub mod dispatcher;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::dispatcher::{DispatchSettings, Dispatcher, DispatcherHandle};
