//! Everything behind the queue's single lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::broadcast::{BroadcastHub, SubscriberId, Subscription};
use crate::domain::{
    QueueCounts, QueueSnapshot, RegistrationParams, StreamEvent, TaskId, TaskRecord, TaskView,
};

/// A task that has just been moved to `running`, ready for a worker.
#[derive(Debug, Clone)]
pub struct Claim {
    pub task_id: TaskId,
    pub params: RegistrationParams,
}

/// Queue state.
///
/// Design:
/// - `records` is the single source of truth, kept in admission order.
/// - `pending` is an index of pending task ids keyed by (created_at, seq),
///   so the first entry is always the next one to run.
/// - Every mutation ends with `publish()`, which recomputes positions and
///   broadcasts while the caller still holds the lock.
pub(crate) struct QueueState {
    records: Vec<TaskRecord>,
    index: HashMap<TaskId, usize>,
    pending: BTreeMap<(DateTime<Utc>, u64), TaskId>,
    running_count: usize,
    ceiling: usize,
    next_seq: u64,
    hub: BroadcastHub,
}

impl QueueState {
    pub(crate) fn new(ceiling: usize, subscriber_buffer: usize) -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            pending: BTreeMap::new(),
            running_count: 0,
            ceiling,
            next_seq: 1,
            hub: BroadcastHub::new(subscriber_buffer),
        }
    }

    pub(crate) fn contains(&self, task_id: TaskId) -> bool {
        self.index.contains_key(&task_id)
    }

    /// Store a new pending task and publish.
    pub(crate) fn admit(
        &mut self,
        task_id: TaskId,
        params: RegistrationParams,
        created_at: DateTime<Utc>,
    ) -> usize {
        let seq = self.next_seq;
        self.next_seq += 1;

        let record = TaskRecord::new(task_id, params, created_at, seq);
        self.pending.insert(record.order_key(), task_id);
        self.index.insert(task_id, self.records.len());
        self.records.push(record);

        self.publish();
        self.record(task_id).map_or(0, TaskRecord::queue_position)
    }

    /// Move the earliest pending task to `running`, if a slot is free.
    pub(crate) fn claim_next(&mut self) -> Option<Claim> {
        if self.running_count >= self.ceiling {
            return None;
        }
        let (_, task_id) = self.pending.pop_first()?;
        let idx = *self.index.get(&task_id)?;
        let record = &mut self.records[idx];

        if let Err(e) = record.mark_running() {
            tracing::error!(error = %e, "pending index out of sync with record");
            return None;
        }
        self.running_count += 1;
        let claim = Claim {
            task_id,
            params: record.params().clone(),
        };

        tracing::info!(
            task_id = %task_id,
            running = self.running_count,
            pending = self.pending.len(),
            "task started"
        );
        self.publish();
        Some(claim)
    }

    /// Record the terminal outcome of a running task and publish.
    pub(crate) fn finish(&mut self, task_id: TaskId, outcome: Result<(), String>, at: DateTime<Utc>) {
        let Some(&idx) = self.index.get(&task_id) else {
            tracing::error!(task_id = %task_id, "finished task is unknown");
            return;
        };
        let record = &mut self.records[idx];

        let applied = match &outcome {
            Ok(()) => record.mark_completed(at),
            Err(message) => record.mark_failed(at, message.as_str()),
        };
        if let Err(e) = applied {
            tracing::error!(error = %e, "ignoring duplicate or misplaced completion");
            return;
        }
        self.running_count = self.running_count.saturating_sub(1);

        match record.error() {
            None => tracing::info!(task_id = %task_id, status = %record.status(), "task finished"),
            Some(error) => tracing::warn!(
                task_id = %task_id,
                status = %record.status(),
                error,
                "task finished"
            ),
        }
        self.publish();
    }

    pub(crate) fn view(&self, task_id: TaskId) -> Option<TaskView> {
        self.record(task_id).map(TaskRecord::view)
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tasks: self.records.iter().map(TaskRecord::view).collect(),
            running_count: self.running_count,
            concurrency_ceiling: self.ceiling,
        }
    }

    pub(crate) fn counts(&self) -> QueueCounts {
        QueueCounts::tally(self.records.iter().map(TaskRecord::status))
    }

    pub(crate) fn running_count(&self) -> usize {
        self.running_count
    }

    pub(crate) fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub(crate) fn subscribe(&mut self) -> Option<Subscription> {
        let payload = self.serialized_snapshot()?;
        Some(self.hub.subscribe(payload))
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.hub.unsubscribe(id)
    }

    pub(crate) fn close_subscribers(&mut self) -> usize {
        self.hub.close()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.hub.len()
    }

    fn record(&self, task_id: TaskId) -> Option<&TaskRecord> {
        self.index.get(&task_id).map(|&idx| &self.records[idx])
    }

    /// Pending positions become 1..k in (created_at, seq) order.
    fn recompute_positions(&mut self) {
        for (position, task_id) in self.pending.values().enumerate() {
            if let Some(&idx) = self.index.get(task_id) {
                self.records[idx].set_queue_position(position + 1);
            }
        }
    }

    fn publish(&mut self) {
        self.recompute_positions();
        if self.hub.is_empty() {
            return;
        }
        if let Some(payload) = self.serialized_snapshot() {
            self.hub.broadcast(payload);
        }
    }

    fn serialized_snapshot(&self) -> Option<Arc<str>> {
        match StreamEvent::QueueUpdate(self.snapshot()).to_json() {
            Ok(json) => Some(Arc::from(json)),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize queue snapshot");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn params(name: &str) -> RegistrationParams {
        RegistrationParams::new(name, "Tester", name, format!("{name}@example.com"))
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap()
    }

    fn new_id() -> TaskId {
        TaskId::from_ulid(Ulid::new())
    }

    fn positions(state: &QueueState) -> Vec<(TaskId, usize)> {
        let mut pending: Vec<_> = state
            .snapshot()
            .tasks
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| (t.task_id, t.queue_position))
            .collect();
        pending.sort_by_key(|(_, p)| *p);
        pending
    }

    #[test]
    fn admission_assigns_dense_positions_in_created_order() {
        let mut state = QueueState::new(1, 4);
        let (a, b, c) = (new_id(), new_id(), new_id());

        // Admitted out of timestamp order on purpose.
        state.admit(b, params("b"), at(2));
        state.admit(a, params("a"), at(1));
        state.admit(c, params("c"), at(3));

        assert_eq!(positions(&state), vec![(a, 1), (b, 2), (c, 3)]);
    }

    #[test]
    fn equal_timestamps_fall_back_to_admission_order() {
        let mut state = QueueState::new(1, 4);
        let (first, second) = (new_id(), new_id());
        state.admit(first, params("first"), at(0));
        state.admit(second, params("second"), at(0));

        let claim = state.claim_next().unwrap();
        assert_eq!(claim.task_id, first);
        assert_eq!(positions(&state), vec![(second, 1)]);
    }

    #[test]
    fn claim_respects_ceiling() {
        let mut state = QueueState::new(2, 4);
        for minute in 0..3 {
            state.admit(new_id(), params("x"), at(minute));
        }

        assert!(state.claim_next().is_some());
        assert!(state.claim_next().is_some());
        assert!(state.claim_next().is_none());
        assert_eq!(state.running_count(), 2);
        assert_eq!(state.counts().pending, 1);
    }

    #[test]
    fn finish_frees_a_slot_and_sets_completion() {
        let mut state = QueueState::new(1, 4);
        let (a, b) = (new_id(), new_id());
        state.admit(a, params("a"), at(0));
        state.admit(b, params("b"), at(1));

        state.claim_next().unwrap();
        assert!(state.claim_next().is_none());

        state.finish(a, Err("captcha rejected".into()), at(5));
        let view = state.view(a).unwrap();
        assert_eq!(view.status, TaskStatus::Failed);
        assert_eq!(view.error.as_deref(), Some("captcha rejected"));
        assert_eq!(view.completed_at, Some(at(5)));
        assert_eq!(state.running_count(), 0);

        assert_eq!(state.claim_next().unwrap().task_id, b);
    }

    #[test]
    fn duplicate_finish_is_ignored() {
        let mut state = QueueState::new(2, 4);
        let (a, b) = (new_id(), new_id());
        state.admit(a, params("a"), at(0));
        state.admit(b, params("b"), at(1));
        state.claim_next().unwrap();
        state.claim_next().unwrap();

        state.finish(a, Ok(()), at(2));
        state.finish(a, Err("again".into()), at(3));

        let view = state.view(a).unwrap();
        assert_eq!(view.status, TaskStatus::Completed);
        assert_eq!(view.completed_at, Some(at(2)));
        assert_eq!(state.running_count(), 1);
    }

    #[tokio::test]
    async fn every_mutation_is_broadcast() {
        let mut state = QueueState::new(1, 16);
        let mut sub = state.subscribe().unwrap();
        let a = new_id();

        state.admit(a, params("a"), at(0));
        state.claim_next().unwrap();
        state.finish(a, Ok(()), at(1));

        let mut statuses = Vec::new();
        while let Some(payload) = sub.try_recv() {
            let event: StreamEvent = serde_json::from_str(&payload).unwrap();
            let StreamEvent::QueueUpdate(snapshot) = event else {
                panic!("expected queue update");
            };
            statuses.push(snapshot.tasks.first().map(|t| t.status));
        }
        assert_eq!(
            statuses,
            vec![
                None,
                Some(TaskStatus::Pending),
                Some(TaskStatus::Running),
                Some(TaskStatus::Completed),
            ]
        );
    }
}
