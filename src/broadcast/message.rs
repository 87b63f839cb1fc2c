//! The unit of delivery: an immutable, typed message on a named channel.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// A message published to a channel.
///
/// Immutable once constructed; delivered by value (clone) to each
/// subscriber, per the "at most once, copied by value" invariant.
#[derive(Debug, Clone)]
pub struct Message<T> {
    /// Globally unique identifier, assigned at construction.
    pub id: String,
    /// Channel this message was published to.
    pub channel: String,
    /// The payload.
    pub payload: T,
    /// When this message was constructed.
    pub created_at: DateTime<Utc>,
    /// Arbitrary caller-supplied metadata.
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl<T> Message<T> {
    /// Construct a new message with a fresh id and the current timestamp.
    pub fn new(channel: impl Into<String>, payload: T) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            channel: channel.into(),
            payload,
            created_at: Utc::now(),
            metadata: None,
        }
    }

    /// Attach metadata, replacing any previously set.
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assigns_unique_ids() {
        let a = Message::new("c", 1);
        let b = Message::new("c", 1);
        assert_ne!(a.id, b.id);
        assert_eq!(a.channel, "c");
    }
}
