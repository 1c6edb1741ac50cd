//! IdGenerator port - task ID generation.

use crate::domain::TaskId;
use crate::ports::Clock;
use ulid::Ulid;

/// Generates task identifiers.
///
/// Requires `Send + Sync` so the queue can share one across threads.
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// ULID-based generator.
///
/// The timestamp component comes from the injected clock, so a `FixedClock`
/// yields IDs that differ only in their random part.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        TaskId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
