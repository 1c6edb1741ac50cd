//! Broadcast hub: registry of subscriber channels.
//!
//! The hub is plain data owned by the queue state, so subscribe, unsubscribe
//! and broadcast all run under the queue's single lock. A snapshot is
//! serialized once and shared between subscribers as `Arc<str>`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::{SubscriberId, Subscription};

pub struct BroadcastHub {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Arc<str>>>,
    next_id: u64,
    buffer: usize,
    closed: bool,
}

impl BroadcastHub {
    /// `buffer` is the per-subscriber channel capacity (minimum 1).
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: HashMap::new(),
            next_id: 1,
            buffer: buffer.max(1),
            closed: false,
        }
    }

    /// Register a new subscriber and deliver `current` to it first.
    ///
    /// After [`close`](Self::close) the subscription still gets `current`,
    /// then ends.
    pub fn subscribe(&mut self, current: Arc<str>) -> Subscription {
        self.prune_closed();

        let id = SubscriberId(self.next_id);
        self.next_id += 1;

        let (tx, rx) = mpsc::channel(self.buffer);
        // Fresh channel with capacity >= 1: cannot be full or closed.
        let _ = tx.try_send(current);
        if self.closed {
            return Subscription::new(id, rx);
        }
        self.subscribers.insert(id, tx);

        tracing::debug!(subscriber = %id, total = self.subscribers.len(), "subscriber joined");
        Subscription::new(id, rx)
    }

    /// Idempotent. Returns whether the subscriber was still registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, total = self.subscribers.len(), "subscriber left");
        }
        removed
    }

    /// Deliver `payload` to every subscriber without waiting.
    ///
    /// Subscribers whose channel is full or closed are dropped. Returns the
    /// number of successful deliveries.
    pub fn broadcast(&mut self, payload: Arc<str>) -> usize {
        let mut dropped = Vec::new();
        let mut delivered = 0;

        for (id, tx) in &self.subscribers {
            match tx.try_send(Arc::clone(&payload)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(subscriber = %id, "subscriber lagging, dropping");
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = %id, "subscriber gone, dropping");
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            self.subscribers.remove(&id);
        }
        delivered
    }

    /// Drop every subscriber and refuse new registrations.
    ///
    /// Each open subscription drains what it already holds, then sees
    /// [`Delivery::Closed`](super::Delivery::Closed). Returns how many were dropped.
    pub fn close(&mut self) -> usize {
        self.closed = true;
        let dropped = self.subscribers.len();
        self.subscribers.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "hub closed");
        }
        dropped
    }

    /// Subscribers whose receiving end is still alive.
    pub fn len(&self) -> usize {
        self.subscribers.values().filter(|tx| !tx.is_closed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune_closed(&mut self) {
        self.subscribers.retain(|_, tx| !tx.is_closed());
    }
}
