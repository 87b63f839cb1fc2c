//! A named fan-out group of subscribers.
//!
//! The subscriber set sits behind its own read-write lock, separate from
//! the hub's channel-name map, so publish can snapshot and release the
//! lock before delivering (§5): the snapshot is a cheap `Vec` clone of
//! `Arc`s, never held across an `.await` on a slow consumer.

use super::target::DeliveryTarget;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub(crate) struct Channel<T: Send + Sync + 'static> {
    subscribers: RwLock<HashMap<String, Arc<dyn DeliveryTarget<T>>>>,
}

impl<T: Send + Sync + 'static> Channel<T> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) async fn insert(&self, id: String, target: Arc<dyn DeliveryTarget<T>>) {
        self.subscribers.write().await.insert(id, target);
    }

    pub(crate) async fn remove(&self, id: &str) {
        self.subscribers.write().await.remove(id);
    }

    /// A point-in-time copy of the subscriber set, taken under the read
    /// lock and then released before the caller delivers to any of them.
    pub(crate) async fn snapshot(&self) -> Vec<Arc<dyn DeliveryTarget<T>>> {
        self.subscribers.read().await.values().cloned().collect()
    }

    pub(crate) async fn count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub(crate) async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::message::Message;
    use crate::broadcast::subscriber::SubscriberCore;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn snapshot_reflects_inserts_and_removes() {
        let channel: Channel<u32> = Channel::new();
        let (tx, _rx) = mpsc::channel::<Message<u32>>(4);
        let core = Arc::new(SubscriberCore::new(tx));
        channel.insert("a".into(), core.clone()).await;
        assert_eq!(channel.count().await, 1);
        assert_eq!(channel.snapshot().await.len(), 1);
        channel.remove("a").await;
        assert!(channel.is_empty().await);
    }
}
