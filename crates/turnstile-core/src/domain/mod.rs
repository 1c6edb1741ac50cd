//! Domain model (ids, parameters, status, records, snapshots).

pub mod ids;
pub mod params;
pub mod record;
pub mod snapshot;
pub mod state;

pub use ids::{ParseTaskIdError, TaskId};
pub use params::{RegistrationParams, ValidationError};
pub use record::{InvalidTransition, TaskRecord, TaskView, UNSPECIFIED_FAILURE};
pub use snapshot::{QueueCounts, QueueSnapshot, StreamEvent};
pub use state::TaskStatus;
