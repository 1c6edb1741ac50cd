//! Ports - seams to the outside world.
//!
//! Each trait hides something the queue must not depend on directly: the time
//! source, ID generation and the registration backend.

pub mod clock;
pub mod executor;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::executor::{ExecutionError, WorkExecutor};
pub use self::id_generator::{IdGenerator, UlidGenerator};
