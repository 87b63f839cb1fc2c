//! The `NotificationStore` capability (§6): durable persistence for
//! notifications, independent of how they're delivered in real time.

use super::types::{Notification, NotificationType};
use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Filters accepted by [`NotificationStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Maximum number of results.
    pub limit: usize,
    /// Number of matching results to skip before collecting `limit`.
    pub offset: usize,
    /// Restrict to unread notifications.
    pub only_unread: bool,
    /// Restrict to these types; empty means no restriction.
    pub types: Vec<NotificationType>,
    /// Restrict to notifications created at or after this time.
    pub since: Option<DateTime<Utc>>,
}

/// Durable persistence for notifications (§4.2, §6).
///
/// Expired notifications (§3) are filtered out at this boundary: callers
/// never see them via `get`/`list`/`count_unread`.
#[async_trait::async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new notification.
    async fn create(&self, notification: Notification) -> CoreResult<Notification>;
    /// Look up one notification by id, scoped to `user_id`.
    async fn get(&self, user_id: &str, id: &str) -> CoreResult<Notification>;
    /// List notifications for `user_id` matching `filter`, newest first.
    async fn list(&self, user_id: &str, filter: ListOptions) -> CoreResult<Vec<Notification>>;
    /// Mark the given ids read for `user_id`. Unknown ids are ignored.
    async fn mark_read(&self, user_id: &str, ids: &[String]) -> CoreResult<()>;
    /// Delete the given ids for `user_id`. Unknown ids are ignored.
    async fn delete(&self, user_id: &str, ids: &[String]) -> CoreResult<()>;
    /// Count unread, non-expired notifications for `user_id`.
    async fn count_unread(&self, user_id: &str) -> CoreResult<usize>;
}

/// In-process [`NotificationStore`] keyed by recipient. Suitable for tests
/// and small deployments; not a durability layer.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    by_user: DashMap<String, Arc<RwLock<Vec<Notification>>>>,
}

impl InMemoryNotificationStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, user_id: &str) -> Arc<RwLock<Vec<Notification>>> {
        self.by_user
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
            .clone()
    }
}

#[async_trait::async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, notification: Notification) -> CoreResult<Notification> {
        let bucket = self.bucket(&notification.recipient_id);
        bucket.write().await.push(notification.clone());
        Ok(notification)
    }

    async fn get(&self, user_id: &str, id: &str) -> CoreResult<Notification> {
        let bucket = self.bucket(user_id);
        bucket
            .read()
            .await
            .iter()
            .find(|n| n.id == id && !n.is_expired())
            .cloned()
            .ok_or_else(|| crate::error::CoreError::NotificationNotFound(id.to_string()))
    }

    async fn list(&self, user_id: &str, filter: ListOptions) -> CoreResult<Vec<Notification>> {
        let bucket = self.bucket(user_id);
        let stored = bucket.read().await;
        let mut matching: Vec<Notification> = stored
            .iter()
            .filter(|n| !n.is_expired())
            .filter(|n| !filter.only_unread || !n.read)
            .filter(|n| filter.types.is_empty() || filter.types.contains(&n.kind))
            .filter(|n| filter.since.map_or(true, |since| n.created_at >= since))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at)); // newest first
        let start = filter.offset.min(matching.len());
        let end = if filter.limit == 0 {
            matching.len()
        } else {
            (start + filter.limit).min(matching.len())
        };
        Ok(matching[start..end].to_vec())
    }

    async fn mark_read(&self, user_id: &str, ids: &[String]) -> CoreResult<()> {
        let bucket = self.bucket(user_id);
        let mut stored = bucket.write().await;
        for n in stored.iter_mut() {
            if ids.contains(&n.id) {
                n.mark_read();
            }
        }
        Ok(())
    }

    async fn delete(&self, user_id: &str, ids: &[String]) -> CoreResult<()> {
        let bucket = self.bucket(user_id);
        bucket.write().await.retain(|n| !ids.contains(&n.id));
        Ok(())
    }

    async fn count_unread(&self, user_id: &str) -> CoreResult<usize> {
        let bucket = self.bucket(user_id);
        Ok(bucket.read().await.iter().filter(|n| !n.read && !n.is_expired()).count())
    }
}
