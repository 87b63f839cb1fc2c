//! `BroadcastHub`: the L1 layer (§2, §4.1) — channel-scoped pub/sub with
//! backpressure, optional durable replay, and optional per-subscriber
//! acknowledgement with retry.

mod ack;
mod channel;
mod config;
mod hub;
mod message;
mod store;
mod subscriber;
mod target;

pub use ack::AckableMessage;
pub use config::HubConfig;
pub use hub::{AckSubscriber, BroadcastHub, PublishOptions, SubscribeOptions};
pub use message::Message;
pub use store::{InMemoryMessageStore, LoadOptions, MessageStore};
pub use subscriber::Subscriber;
