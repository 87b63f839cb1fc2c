//! The `RateLimitStore` capability (§4.3, §5): pluggable per-key bucket
//! state, with an in-memory implementation behind a single mutex and an
//! optional background staleness sweeper.

use super::bucket::{BucketState, RateLimitConfig};
use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Staleness threshold for the in-memory store's background sweeper.
const STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Default sweeper period; `0` disables the sweeper entirely.
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Atomic per-key token consumption, pluggable so the limiter itself never
/// assumes a particular backing store.
#[async_trait::async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Apply the refill-then-consume step for `key` and return
    /// `(remaining, reset_at)`.
    async fn consume_tokens(
        &self,
        key: &str,
        n: i64,
        config: &RateLimitConfig,
    ) -> CoreResult<(i64, DateTime<Utc>)>;

    /// Delete all state for `key`.
    async fn reset(&self, key: &str) -> CoreResult<()>;

    /// Release any background resources (idempotent).
    async fn close(&self);
}

struct Inner {
    buckets: Mutex<HashMap<String, BucketState>>,
    closed: std::sync::atomic::AtomicBool,
}

/// The in-memory store described in §4.3: one mutex over the whole bucket
/// map (the hot path is short: arithmetic plus a map lookup), and an
/// optional periodic sweep dropping buckets untouched for over an hour.
pub struct InMemoryRateLimitStore {
    inner: Arc<Inner>,
}

impl InMemoryRateLimitStore {
    /// A store with the default sweep period (5 minutes).
    pub fn new() -> Self {
        Self::with_sweep_period(DEFAULT_SWEEP_PERIOD)
    }

    /// A store whose sweeper runs every `period`; `Duration::ZERO` disables it.
    pub fn with_sweep_period(period: Duration) -> Self {
        let inner = Arc::new(Inner {
            buckets: Mutex::new(HashMap::new()),
            closed: std::sync::atomic::AtomicBool::new(false),
        });
        if !period.is_zero() {
            let sweeper = inner.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    if sweeper.closed.load(std::sync::atomic::Ordering::SeqCst) {
                        return;
                    }
                    let now = Utc::now();
                    let mut buckets = sweeper.buckets.lock().await;
                    let before = buckets.len();
                    buckets.retain(|_, state| {
                        now.signed_duration_since(state.last_access).to_std().unwrap_or(Duration::ZERO) < STALE_AFTER
                    });
                    let removed = before - buckets.len();
                    if removed > 0 {
                        tracing::debug!(removed, "swept stale rate limit buckets");
                    }
                }
            });
        }
        Self { inner }
    }
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn consume_tokens(
        &self,
        key: &str,
        n: i64,
        config: &RateLimitConfig,
    ) -> CoreResult<(i64, DateTime<Utc>)> {
        let now = Utc::now();
        let mut buckets = self.inner.buckets.lock().await;
        let state = buckets
            .entry(key.to_string())
            .or_insert_with(|| BucketState::new(config, now));
        Ok(state.consume(config, n, now))
    }

    async fn reset(&self, key: &str) -> CoreResult<()> {
        self.inner.buckets.lock().await.remove(key);
        Ok(())
    }

    async fn close(&self) {
        self.inner.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn config() -> RateLimitConfig {
        RateLimitConfig::new(5, 5, StdDuration::from_millis(100)).unwrap()
    }

    #[tokio::test]
    async fn consume_creates_bucket_on_first_touch() {
        let store = InMemoryRateLimitStore::with_sweep_period(Duration::ZERO);
        let (remaining, _) = store.consume_tokens("k", 1, &config()).await.unwrap();
        assert_eq!(remaining, 4);
    }

    #[tokio::test]
    async fn reset_deletes_state() {
        let store = InMemoryRateLimitStore::with_sweep_period(Duration::ZERO);
        store.consume_tokens("k", 5, &config()).await.unwrap();
        store.reset("k").await.unwrap();
        let (remaining, _) = store.consume_tokens("k", 0, &config()).await.unwrap();
        assert_eq!(remaining, 5); // fresh bucket again
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let store = InMemoryRateLimitStore::with_sweep_period(Duration::from_millis(10));
        store.close().await;
        store.close().await;
    }
}
