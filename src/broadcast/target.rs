//! The channel subscriber map stores one `DeliveryTarget` per subscriber,
//! so plain and ack-tracked subscribers can share a channel's subscriber
//! set uniformly under the publish loop's slow-consumer timeout.

use super::message::Message;
use super::subscriber::DeliveryOutcome;
use std::time::Duration;

/// Something a published [`Message`] can be delivered to.
#[async_trait::async_trait]
pub(crate) trait DeliveryTarget<T: Send + Sync + 'static>: Send + Sync {
    async fn deliver(&self, message: Message<T>, timeout: Duration) -> DeliveryOutcome;
    fn is_closed(&self) -> bool;
    async fn close(&self);
}

/// Plain (non-ack) subscribers deliver a [`Message`] straight into their
/// bounded channel.
#[async_trait::async_trait]
impl<T: Send + Sync + 'static> DeliveryTarget<T> for super::subscriber::SubscriberCore<Message<T>> {
    async fn deliver(&self, message: Message<T>, timeout: Duration) -> DeliveryOutcome {
        super::subscriber::SubscriberCore::deliver(self, message, timeout).await
    }

    fn is_closed(&self) -> bool {
        super::subscriber::SubscriberCore::is_closed(self)
    }

    async fn close(&self) {
        super::subscriber::SubscriberCore::close(self).await;
    }
}
