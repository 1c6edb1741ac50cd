//! Queue-wide snapshots and the events streamed to subscribers.

use serde::{Deserialize, Serialize};

use super::{TaskId, TaskStatus, TaskView};

/// Consistent copy of the whole queue at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Every known task, in admission order.
    pub tasks: Vec<TaskView>,
    pub running_count: usize,
    pub concurrency_ceiling: usize,
}

impl QueueSnapshot {
    pub fn task(&self, task_id: TaskId) -> Option<&TaskView> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn counts(&self) -> QueueCounts {
        QueueCounts::tally(self.tasks.iter().map(|t| t.status))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn tally(statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// What a subscriber receives on the wire.
///
/// Serialized with a `type` tag:
/// `{"type":"queue_update","tasks":[...],"running_count":1,"concurrency_ceiling":2}`
/// or `{"type":"heartbeat"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    QueueUpdate(QueueSnapshot),
    Heartbeat,
}

impl StreamEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
