//! Acknowledgement tracking for `SubscribeWithAck`.
//!
//! Each delivered message becomes one [`PendingAck`] entry in a table owned
//! by the subscriber's [`AckTracker`]. A single retry task per delivery
//! mutates that same entry's retry count in place and re-arms its own
//! timer; it never allocates a second entry for the same delivery (§9,
//! resolved ambiguity on retry scheduling).

use super::message::Message;
use super::subscriber::SubscriberCore;
use super::target::DeliveryTarget;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One in-flight delivery awaiting acknowledgement.
struct PendingAck<T> {
    message: Message<T>,
    retry_count: u32,
}

/// Per-subscriber table of pending acknowledgements, plus the knobs
/// governing retry behavior for that subscriber.
pub(crate) struct AckTracker<T> {
    pending: Mutex<HashMap<String, PendingAck<T>>>,
    ack_timeout: Duration,
    max_retries: u32,
    core: Arc<SubscriberCore<AckableMessage<T>>>,
    on_ack_timeout: Option<Arc<dyn Fn(Message<T>) + Send + Sync>>,
}

impl<T: Clone + Send + Sync + 'static> AckTracker<T> {
    pub(crate) fn new(
        ack_timeout: Duration,
        max_retries: u32,
        core: Arc<SubscriberCore<AckableMessage<T>>>,
        on_ack_timeout: Option<Arc<dyn Fn(Message<T>) + Send + Sync>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            ack_timeout,
            max_retries,
            core,
            on_ack_timeout,
        })
    }

    /// Track a freshly delivered message and spawn its retry loop.
    pub(crate) async fn track(self: &Arc<Self>, message: Message<T>) {
        let id = message.id.clone();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(
                id.clone(),
                PendingAck {
                    message,
                    retry_count: 0,
                },
            );
        }
        let tracker = self.clone();
        tokio::spawn(async move { tracker.retry_loop(id).await });
    }

    async fn retry_loop(self: Arc<Self>, message_id: String) {
        loop {
            tokio::time::sleep(self.ack_timeout).await;
            if self.core.is_closed() {
                self.pending.lock().await.remove(&message_id);
                return;
            }
            let redeliver = {
                let mut pending = self.pending.lock().await;
                let Some(entry) = pending.get_mut(&message_id) else {
                    return; // resolved by ack/nack
                };
                entry.retry_count += 1;
                if entry.retry_count > self.max_retries {
                    let entry = pending.remove(&message_id).unwrap();
                    drop(pending);
                    tracing::debug!(message_id = %message_id, "ack retries exhausted");
                    if let Some(cb) = &self.on_ack_timeout {
                        cb(entry.message);
                    }
                    return;
                }
                entry.message.clone()
            };
            tracing::trace!(message_id = %message_id, "redelivering unacknowledged message");
            let ackable = AckableMessage::new(redeliver, self.clone(), message_id.clone());
            let _ = self.core.deliver(ackable, self.ack_timeout).await;
        }
    }

    /// Resolve a pending entry (ack or nack). Idempotent: only the first
    /// caller for a given message id observes an effect.
    async fn resolve(&self, message_id: &str) {
        self.pending.lock().await.remove(message_id);
    }
}

/// A delivered message requiring explicit acknowledgement.
///
/// `ack`/`nack` are exactly-once-callable: the first call stops the retry
/// timer and removes the tracking entry; subsequent calls are no-ops.
pub struct AckableMessage<T> {
    message: Message<T>,
    tracker: Arc<AckTracker<T>>,
    message_id: String,
}

impl<T: Clone + Send + Sync + 'static> AckableMessage<T> {
    pub(crate) fn new(message: Message<T>, tracker: Arc<AckTracker<T>>, message_id: String) -> Self {
        Self {
            message,
            tracker,
            message_id,
        }
    }

    /// The wrapped message.
    pub fn message(&self) -> &Message<T> {
        &self.message
    }

    /// Acknowledge successful processing. Idempotent.
    pub async fn ack(&self) {
        self.tracker.resolve(&self.message_id).await;
    }

    /// Reject the message, ending retry tracking without redelivery.
    /// Idempotent. Note: unlike a timeout, an explicit `nack` does not
    /// invoke the `on_ack_timeout` callback.
    pub async fn nack(&self) {
        self.tracker.resolve(&self.message_id).await;
    }
}

impl<T: Clone> Clone for AckableMessage<T> {
    fn clone(&self) -> Self {
        Self {
            message: self.message.clone(),
            tracker: self.tracker.clone(),
            message_id: self.message_id.clone(),
        }
    }
}

/// Adapts an [`AckTracker`] to the channel's uniform [`DeliveryTarget<T>`]
/// so ack-tracked and plain subscribers can share one subscriber set: the
/// hub always delivers a `Message<T>`, and this wraps it into an
/// [`AckableMessage`] before handing it to the subscriber's bounded buffer.
pub(crate) struct AckAdapter<T> {
    tracker: Arc<AckTracker<T>>,
}

impl<T: Clone + Send + Sync + 'static> AckAdapter<T> {
    pub(crate) fn new(tracker: Arc<AckTracker<T>>) -> Self {
        Self { tracker }
    }
}

#[async_trait::async_trait]
impl<T: Clone + Send + Sync + 'static> DeliveryTarget<T> for AckAdapter<T> {
    async fn deliver(&self, message: Message<T>, timeout: Duration) -> super::subscriber::DeliveryOutcome {
        let ackable = AckableMessage::new(message.clone(), self.tracker.clone(), message.id.clone());
        let outcome = self.tracker.core.deliver(ackable, timeout).await;
        if outcome == super::subscriber::DeliveryOutcome::Delivered {
            self.tracker.track(message).await;
        }
        outcome
    }

    fn is_closed(&self) -> bool {
        self.tracker.core.is_closed()
    }

    async fn close(&self) {
        self.tracker.core.close().await;
    }
}
