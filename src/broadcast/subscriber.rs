//! Subscriber endpoints and the locked per-subscriber close guard.
//!
//! This module implements the binding resolution from §4.1.1: the send
//! path and the close path share a single `tokio::sync::Mutex` around the
//! outgoing sender, so a send can never observe a half-closed subscriber.

use super::message::Message;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, mpsc};

/// Outcome of one delivery attempt to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The message was handed to the subscriber's buffer.
    Delivered,
    /// The slow-consumer timer fired before the buffer had room.
    TimedOut,
    /// The subscriber was already closed (or closed during the attempt).
    Closed,
}

/// Shared state behind one subscriber's outgoing channel.
///
/// Generic over the item type flowing through the channel so the same
/// close-guard machinery serves both plain [`super::Message`] subscribers
/// and ack-wrapped subscribers.
pub(crate) struct SubscriberCore<U> {
    sender: Mutex<Option<mpsc::Sender<U>>>,
    closed: AtomicBool,
    notify: Notify,
}

impl<U: Send + 'static> SubscriberCore<U> {
    pub(crate) fn new(sender: mpsc::Sender<U>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close this subscriber. Idempotent: only the first caller observes
    /// `true`; later callers see `false` and no side effect occurs.
    pub(crate) async fn close(&self) -> bool {
        let mut guard = self.sender.lock().await;
        if guard.take().is_some() {
            self.closed.store(true, Ordering::SeqCst);
            self.notify.notify_waiters();
            true
        } else {
            false
        }
    }

    /// Attempt one delivery, racing enqueue against `timeout`.
    ///
    /// Holds the same lock `close()` takes for the duration of the race, so
    /// the two can never interleave: either this call observes the sender
    /// already gone (`Closed`), or it completes its send/timeout race while
    /// holding the lock and `close()` simply waits its turn.
    pub(crate) async fn deliver(&self, item: U, timeout: Duration) -> DeliveryOutcome {
        let guard = self.sender.lock().await;
        let Some(sender) = guard.as_ref() else {
            return DeliveryOutcome::Closed;
        };
        tokio::select! {
            res = sender.send(item) => match res {
                Ok(()) => DeliveryOutcome::Delivered,
                Err(_) => DeliveryOutcome::Closed,
            },
            _ = tokio::time::sleep(timeout) => DeliveryOutcome::TimedOut,
        }
    }
}

/// Receiving half of a plain (non-ack) subscription.
pub struct Subscriber<T> {
    pub(crate) id: String,
    pub(crate) channel: String,
    pub(crate) receiver: mpsc::Receiver<Message<T>>,
    pub(crate) core: Arc<SubscriberCore<Message<T>>>,
}

impl<T> Subscriber<T> {
    /// This subscriber's unique id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The channel this subscriber is attached to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receive the next message, or `None` once the subscriber is closed
    /// and drained.
    pub async fn recv(&mut self) -> Option<Message<T>> {
        self.receiver.recv().await
    }

    /// True if this subscriber has been closed.
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Close this subscriber directly, without going through the hub.
    pub async fn close(&self) {
        self.core.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_is_idempotent_and_serializes_against_send() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let core = SubscriberCore::new(tx);

        assert!(core.close().await);
        assert!(!core.close().await); // second close is a no-op
        assert!(core.is_closed());

        let outcome = core.deliver(1, Duration::from_millis(10)).await;
        assert_eq!(outcome, DeliveryOutcome::Closed);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn deliver_times_out_on_full_buffer() {
        let (tx, _rx) = mpsc::channel::<u32>(1);
        let core = SubscriberCore::new(tx);
        assert_eq!(
            core.deliver(1, Duration::from_millis(20)).await,
            DeliveryOutcome::Delivered
        );
        // buffer is now full (capacity 1, nothing drained); next send times out
        let outcome = core.deliver(2, Duration::from_millis(20)).await;
        assert_eq!(outcome, DeliveryOutcome::TimedOut);
    }
}
