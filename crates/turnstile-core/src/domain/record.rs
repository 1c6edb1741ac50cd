//! Task record: identity + parameters + mutable status fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RegistrationParams, TaskId, TaskStatus};

/// Fallback failure text when an executor reports failure without a message.
pub const UNSPECIFIED_FAILURE: &str = "registration failed without an error message";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("task {task_id}: illegal transition {from} -> {to}")]
pub struct InvalidTransition {
    pub task_id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// The single source of truth for one task.
///
/// Only the queue holds these; everyone else gets a [`TaskView`] copy.
/// All state transitions happen through the `mark_*` methods.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    id: TaskId,
    params: RegistrationParams,
    status: TaskStatus,
    error: Option<String>,
    queue_position: usize,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    /// Admission order; breaks ties between equal `created_at` values.
    seq: u64,
}

impl TaskRecord {
    pub fn new(id: TaskId, params: RegistrationParams, created_at: DateTime<Utc>, seq: u64) -> Self {
        Self {
            id,
            params,
            status: TaskStatus::Pending,
            error: None,
            queue_position: 0,
            created_at,
            completed_at: None,
            seq,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn params(&self) -> &RegistrationParams {
        &self.params
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn queue_position(&self) -> usize {
        self.queue_position
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Ordering key among pending tasks.
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.seq)
    }

    /// Only meaningful while pending; ignored otherwise.
    pub fn set_queue_position(&mut self, position: usize) {
        if self.status == TaskStatus::Pending {
            self.queue_position = position;
        }
    }

    pub fn mark_running(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Running)?;
        self.queue_position = 0;
        Ok(())
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Completed)?;
        self.completed_at = Some(at);
        Ok(())
    }

    /// An empty message is replaced with [`UNSPECIFIED_FAILURE`].
    pub fn mark_failed(
        &mut self,
        at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Failed)?;
        let error = error.into();
        self.error = Some(if error.trim().is_empty() {
            UNSPECIFIED_FAILURE.to_string()
        } else {
            error
        });
        self.completed_at = Some(at);
        Ok(())
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                task_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn view(&self) -> TaskView {
        TaskView {
            task_id: self.id,
            status: self.status,
            error: self.error.clone(),
            queue_position: self.queue_position,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Read-only copy of a task's observable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub queue_position: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
