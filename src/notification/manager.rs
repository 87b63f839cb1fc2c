//! `Manager`: orchestrates a [`NotificationStore`] and a [`Deliverer`] (§4.2).
//!
//! Store-before-deliver throughout: a notification only fails a `Send` if
//! persistence fails, never if real-time delivery fails. Delivery errors
//! are logged and never surfaced to the caller (§7).

use super::deliverer::Deliverer;
use super::store::{ListOptions, NotificationStore};
use super::types::Notification;
use crate::error::CoreResult;
use std::sync::Arc;

/// Orchestrates persistence and real-time fan-out for notifications.
pub struct Manager {
    store: Arc<dyn NotificationStore>,
    deliverer: Arc<dyn Deliverer>,
}

impl Manager {
    /// Build a manager over the given store and deliverer.
    pub fn new(store: Arc<dyn NotificationStore>, deliverer: Arc<dyn Deliverer>) -> Self {
        Self { store, deliverer }
    }

    /// Store, then deliver, one notification. Store failures are returned;
    /// deliverer failures are the deliverer's own concern (§7) and never
    /// propagate here.
    pub async fn send(&self, notification: Notification) -> CoreResult<Notification> {
        let stored = self.store.create(notification).await?;
        self.deliverer.deliver(&stored).await;
        Ok(stored)
    }

    /// Store each notification in `notifications`, then issue one batch
    /// delivery. If any store call fails, that error is returned
    /// immediately and no delivery is attempted. Per §4.2.1, an empty
    /// slice is a legal no-op that still invokes the deliverer.
    pub async fn send_batch(&self, notifications: Vec<Notification>) -> CoreResult<Vec<Notification>> {
        let mut stored = Vec::with_capacity(notifications.len());
        for n in notifications {
            stored.push(self.store.create(n).await?);
        }
        self.deliverer.deliver_batch(&stored).await;
        Ok(stored)
    }

    /// Send a copy of `template` to each id in `recipient_ids`, each with a
    /// fresh id, timestamp, and overridden recipient.
    pub async fn send_to_users(&self, recipient_ids: &[String], template: &Notification) -> CoreResult<Vec<Notification>> {
        let mut stored = Vec::with_capacity(recipient_ids.len());
        for recipient_id in recipient_ids {
            let mut copy = template.clone();
            copy.id = uuid::Uuid::now_v7().to_string();
            copy.created_at = chrono::Utc::now();
            copy.recipient_id = recipient_id.clone();
            stored.push(self.store.create(copy).await?);
        }
        self.deliverer.deliver_batch(&stored).await;
        Ok(stored)
    }

    /// Fetch a single notification by id, scoped to `user_id`.
    pub async fn get(&self, user_id: &str, id: &str) -> CoreResult<Notification> {
        self.store.get(user_id, id).await
    }

    /// List notifications for `user_id` matching `filter`.
    pub async fn list(&self, user_id: &str, filter: ListOptions) -> CoreResult<Vec<Notification>> {
        self.store.list(user_id, filter).await
    }

    /// Mark the given ids read.
    pub async fn mark_read(&self, user_id: &str, ids: &[String]) -> CoreResult<()> {
        self.store.mark_read(user_id, ids).await
    }

    /// Mark every currently unread notification read. A no-op if there are
    /// none.
    pub async fn mark_all_read(&self, user_id: &str) -> CoreResult<()> {
        let unread = self
            .store
            .list(user_id, ListOptions {
                only_unread: true,
                ..Default::default()
            })
            .await?;
        if unread.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = unread.into_iter().map(|n| n.id).collect();
        self.store.mark_read(user_id, &ids).await
    }

    /// Delete the given ids.
    pub async fn delete(&self, user_id: &str, ids: &[String]) -> CoreResult<()> {
        self.store.delete(user_id, ids).await
    }

    /// Count unread, non-expired notifications.
    pub async fn count_unread(&self, user_id: &str) -> CoreResult<usize> {
        self.store.count_unread(user_id).await
    }
}
