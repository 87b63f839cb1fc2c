//! The `MessageStore` capability (§6): durable persistence backing replay.
//!
//! The hub treats this as an injected dependency; it never assumes a
//! particular database. The in-memory implementation here exists for
//! tests and for callers who want replay semantics without wiring up
//! real persistence.

use super::message::Message;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Filters for [`MessageStore::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Maximum number of messages to return, most recent first.
    pub limit: usize,
    /// Only messages created strictly before this time.
    pub before: Option<DateTime<Utc>>,
    /// Only messages created strictly after this time.
    pub after: Option<DateTime<Utc>>,
    /// Only messages after this id, for cursor-style pagination.
    pub last_id: Option<String>,
}

/// Durable persistence for published messages, used for replay on
/// subscribe (§4.1) and for the hub's "persistence hint" publish option.
#[async_trait::async_trait]
pub trait MessageStore<T>: Send + Sync {
    /// Persist one message. A failure here aborts the publish: per §4.1,
    /// the message is not delivered if storage fails.
    async fn store(&self, message: &Message<T>) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Load the most recent messages for a channel matching `options`.
    async fn load(
        &self,
        channel: &str,
        options: LoadOptions,
    ) -> Result<Vec<Message<T>>, Box<dyn std::error::Error + Send + Sync>>;

    /// Delete all messages created before `before`, across all channels.
    async fn delete(&self, before: DateTime<Utc>) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Snapshot of channel names with at least one stored message.
    async fn channels(&self) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>>;
}

/// A simple in-process [`MessageStore`] backed by one append-only `Vec`
/// per channel. Unbounded: intended for tests and small deployments, not
/// as a production durability layer.
pub struct InMemoryMessageStore<T> {
    channels: DashMap<String, Arc<RwLock<Vec<Message<T>>>>>,
}

impl<T> InMemoryMessageStore<T> {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }
}

impl<T> Default for InMemoryMessageStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<T: Clone + Send + Sync + 'static> MessageStore<T> for InMemoryMessageStore<T> {
    async fn store(&self, message: &Message<T>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let entry = self
            .channels
            .entry(message.channel.clone())
            .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
            .clone();
        entry.write().await.push(message.clone());
        Ok(())
    }

    async fn load(
        &self,
        channel: &str,
        options: LoadOptions,
    ) -> Result<Vec<Message<T>>, Box<dyn std::error::Error + Send + Sync>> {
        let Some(entry) = self.channels.get(channel).map(|e| e.clone()) else {
            return Ok(Vec::new());
        };
        let stored = entry.read().await;
        let mut matching: Vec<Message<T>> = stored
            .iter()
            .filter(|m| options.before.map_or(true, |b| m.created_at < b))
            .filter(|m| options.after.map_or(true, |a| m.created_at > a))
            .filter(|m| options.last_id.as_deref().map_or(true, |id| m.id != id))
            .cloned()
            .collect();
        // newest first
        matching.reverse();
        if options.limit > 0 && matching.len() > options.limit {
            matching.truncate(options.limit);
        }
        Ok(matching)
    }

    async fn delete(&self, before: DateTime<Utc>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for entry in self.channels.iter() {
            let mut stored = entry.value().write().await;
            stored.retain(|m| m.created_at >= before);
        }
        Ok(())
    }

    async fn channels(&self) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.channels.iter().map(|e| e.key().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_load_returns_newest_first() {
        let store: InMemoryMessageStore<u32> = InMemoryMessageStore::new();
        let m1 = Message::new("c", 1u32);
        let m2 = Message::new("c", 2u32);
        store.store(&m1).await.unwrap();
        store.store(&m2).await.unwrap();
        let loaded = store
            .load("c", LoadOptions {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].payload, 2);
        assert_eq!(loaded[1].payload, 1);
    }

    #[tokio::test]
    async fn load_respects_limit() {
        let store: InMemoryMessageStore<u32> = InMemoryMessageStore::new();
        for i in 0..5u32 {
            store.store(&Message::new("c", i)).await.unwrap();
        }
        let loaded = store
            .load("c", LoadOptions {
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].payload, 4);
    }

    #[tokio::test]
    async fn load_for_unknown_channel_is_empty() {
        let store: InMemoryMessageStore<u32> = InMemoryMessageStore::new();
        let loaded = store.load("missing", LoadOptions::default()).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn delete_drops_old_messages() {
        let store: InMemoryMessageStore<u32> = InMemoryMessageStore::new();
        store.store(&Message::new("c", 1u32)).await.unwrap();
        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        store.delete(cutoff).await.unwrap();
        let loaded = store.load("c", LoadOptions::default()).await.unwrap();
        assert!(loaded.is_empty());
    }
}
