//! Real-time delivery sinks for notifications (§4.2): a broadcast-backed
//! deliverer, a no-op, and a best-effort fan-out composite.

use super::types::Notification;
use crate::broadcast::{BroadcastHub, HubConfig, PublishOptions, Subscriber, SubscribeOptions};
use crate::context::RequestContext;
use crate::error::CoreResult;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A real-time sink for notifications.
#[async_trait::async_trait]
pub trait Deliverer: Send + Sync {
    /// Deliver a single notification.
    async fn deliver(&self, notification: &Notification);
    /// Deliver a batch. Per §4.2.1, an empty batch is still a legal call —
    /// implementations must not skip it.
    async fn deliver_batch(&self, notifications: &[Notification]);
}

/// Discards everything. Useful as a default when no real-time transport
/// is wired up yet.
pub struct NoopDeliverer;

#[async_trait::async_trait]
impl Deliverer for NoopDeliverer {
    async fn deliver(&self, _notification: &Notification) {}
    async fn deliver_batch(&self, _notifications: &[Notification]) {}
}

/// Invokes each child deliverer in order; a failing child never aborts the
/// fan-out (best-effort delivery, §7). "Failing" here means the child
/// itself is expected to swallow its own errors — this composite has no
/// visibility into them, matching `Deliverer`'s infallible signature.
pub struct FanOutDeliverer {
    children: Vec<Arc<dyn Deliverer>>,
}

impl FanOutDeliverer {
    /// Build a fan-out over `children`, invoked in the given order.
    pub fn new(children: Vec<Arc<dyn Deliverer>>) -> Self {
        Self { children }
    }
}

#[async_trait::async_trait]
impl Deliverer for FanOutDeliverer {
    async fn deliver(&self, notification: &Notification) {
        for child in &self.children {
            child.deliver(notification).await;
        }
    }

    async fn deliver_batch(&self, notifications: &[Notification]) {
        for child in &self.children {
            child.deliver_batch(notifications).await;
        }
    }
}

const RECIPIENT_CHANNEL: &str = "notifications";

/// Owns a bounded map of per-recipient [`BroadcastHub`]s, with strict LRU
/// eviction once the map exceeds its configured capacity (default 10,000,
/// §4.2). Each recipient's hub is single-channel: `"notifications"`.
pub struct BroadcastDeliverer {
    hubs: Mutex<LruCache<String, BroadcastHub<Notification>>>,
    hub_config: HubConfig,
}

impl BroadcastDeliverer {
    /// Default capacity per §4.2.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// A deliverer with the given LRU capacity (clamped to at least 1) and
    /// per-recipient hub configuration.
    pub fn new(capacity: usize, hub_config: HubConfig) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("clamped to at least 1");
        Self {
            hubs: Mutex::new(LruCache::new(cap)),
            hub_config,
        }
    }

    /// A deliverer with the default capacity and hub defaults.
    pub fn with_defaults() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, HubConfig::new())
    }

    /// Get-or-create the recipient's hub, promoting its LRU position. If
    /// creating it evicts another recipient's hub, the victim is closed
    /// outside the map lock so teardown never blocks other recipients.
    async fn hub_for(&self, recipient_id: &str) -> BroadcastHub<Notification> {
        let (hub, evicted) = {
            let mut hubs = self.hubs.lock().await;
            if let Some(hub) = hubs.get(recipient_id) {
                return hub.clone();
            }
            let hub = BroadcastHub::new(self.hub_config.clone());
            let evicted = hubs.push(recipient_id.to_string(), hub.clone());
            (hub, evicted)
        };
        if let Some((evicted_id, evicted_hub)) = evicted {
            tracing::debug!(recipient_id = %evicted_id, "evicting idle recipient broadcaster");
            tokio::spawn(async move {
                let _ = evicted_hub.close().await;
            });
        }
        hub
    }

    /// Subscribe to real-time notifications for `recipient_id`, creating
    /// its broadcaster (and promoting its LRU position) if necessary.
    pub async fn subscribe(&self, ctx: &RequestContext, recipient_id: &str) -> CoreResult<Subscriber<Notification>> {
        let hub = self.hub_for(recipient_id).await;
        hub.subscribe(ctx, RECIPIENT_CHANNEL, SubscribeOptions::default()).await
    }

    /// Close every live broadcaster and reset the map.
    pub async fn close(&self) {
        let mut hubs = self.hubs.lock().await;
        let all: Vec<BroadcastHub<Notification>> = hubs.iter().map(|(_, hub)| hub.clone()).collect();
        hubs.clear();
        drop(hubs);
        for hub in all {
            let _ = hub.close().await;
        }
    }
}

#[async_trait::async_trait]
impl Deliverer for BroadcastDeliverer {
    async fn deliver(&self, notification: &Notification) {
        let hub = self.hub_for(&notification.recipient_id).await;
        let ctx = RequestContext::new();
        if let Err(err) = hub
            .publish(&ctx, RECIPIENT_CHANNEL, notification.clone(), PublishOptions::new())
            .await
        {
            tracing::warn!(recipient_id = %notification.recipient_id, error = %err, "real-time delivery failed");
        }
    }

    async fn deliver_batch(&self, notifications: &[Notification]) {
        let mut by_recipient: HashMap<&str, Vec<&Notification>> = HashMap::new();
        for n in notifications {
            by_recipient.entry(n.recipient_id.as_str()).or_default().push(n);
        }
        for (recipient_id, batch) in by_recipient {
            let hub = self.hub_for(recipient_id).await;
            let ctx = RequestContext::new();
            for n in batch {
                if let Err(err) = hub
                    .publish(&ctx, RECIPIENT_CHANNEL, n.clone(), PublishOptions::new())
                    .await
                {
                    tracing::warn!(recipient_id = %recipient_id, error = %err, "real-time delivery failed");
                }
            }
        }
    }
}
