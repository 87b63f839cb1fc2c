//! `NotificationCore`: the L2 layer (§2, §4.2) — durable, user-addressed
//! notifications fanned out to real-time sinks via the broadcast hub.

mod deliverer;
mod manager;
mod store;
mod types;

pub use deliverer::{BroadcastDeliverer, Deliverer, FanOutDeliverer, NoopDeliverer};
pub use manager::Manager;
pub use store::{InMemoryNotificationStore, ListOptions, NotificationStore};
pub use types::{Action, Notification, NotificationType, Priority};
