//! Subscriber side of the broadcast hub.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

/// Identifier of a hub subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Result of waiting on a subscription with a deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Next serialized snapshot, in broadcast order.
    Snapshot(Arc<str>),
    /// Nothing arrived before the deadline; time for a heartbeat.
    Idle,
    /// The hub dropped this subscriber (lagging or unsubscribed).
    Closed,
}

/// Receiving end handed out by [`BroadcastHub::subscribe`](super::BroadcastHub::subscribe).
///
/// Dropping it closes the channel; the hub prunes the entry on its next
/// broadcast or subscribe.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<str>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, rx: mpsc::Receiver<Arc<str>>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next snapshot. `None` once the hub has dropped us.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }

    pub async fn recv_timeout(&mut self, timeout: Duration) -> Delivery {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(payload)) => Delivery::Snapshot(payload),
            Ok(None) => Delivery::Closed,
            Err(_) => Delivery::Idle,
        }
    }

    /// Non-blocking poll, mostly for tests.
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.close();
    }
}
