//! Cooperative cancellation carrier threaded through every suspension point.
//!
//! This is deliberately small: no ambient/global request state, just a
//! cancellation signal (optionally with a deadline) that callers create per
//! request and pass down into `Subscribe`, `Publish`, and friends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// A per-request cancellation token.
///
/// Clones share the same underlying signal: cancelling any clone cancels
/// all of them.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl RequestContext {
    /// Create a context that is never cancelled unless [`RequestContext::cancel`]
    /// is called explicitly.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Create a context that cancels itself after `timeout` elapses, in
    /// addition to being cancellable explicitly.
    pub fn with_timeout(timeout: Duration) -> Self {
        let ctx = Self::new();
        let watcher = ctx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => watcher.cancel(),
                _ = watcher.cancelled() => {}
            }
        });
        ctx
    }

    /// Cancel this context. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// True if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once this context is cancelled.
    pub async fn cancelled(&self) {
        // Must register with `Notify` before checking the flag: `cancel()`
        // calls `notify_waiters()` unconditionally, which only wakes
        // `Notified` futures that already exist. Checking first and
        // registering after would miss a `cancel()` that races in between.
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_observed_by_clones() {
        let ctx = RequestContext::new();
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());
        clone.cancelled().await; // must resolve immediately, no hang
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let ctx = RequestContext::new();
        ctx.cancel();
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn with_timeout_self_cancels() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(20));
        assert!(!ctx.is_cancelled());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(ctx.is_cancelled());
    }
}
