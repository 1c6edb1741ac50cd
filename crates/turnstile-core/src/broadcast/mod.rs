//! Fan-out of queue snapshots to streaming subscribers.

mod hub;
mod subscription;

pub use hub::BroadcastHub;
pub use subscription::{Delivery, SubscriberId, Subscription};
