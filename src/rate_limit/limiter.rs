//! `RateLimiter`: the public façade over a [`RateLimitStore`] (§4.3).

use super::bucket::RateLimitConfig;
use super::store::RateLimitStore;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowResult {
    /// The bucket's capacity.
    pub limit: i64,
    /// Tokens left after this check (may be negative on overdraft).
    pub remaining: i64,
    /// When the bucket is next expected to refill.
    pub reset_at: DateTime<Utc>,
}

impl AllowResult {
    /// Whether the request should be admitted.
    pub fn allowed(&self) -> bool {
        self.remaining >= 0
    }

    /// How long the caller should wait before retrying, if rejected.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        if self.allowed() {
            return None;
        }
        let wait = self.reset_at.signed_duration_since(now);
        Some(if wait > chrono::Duration::zero() { wait } else { chrono::Duration::zero() })
    }
}

/// A named rate limiter over a pluggable [`RateLimitStore`].
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Build a limiter with the given config and store.
    pub fn new(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self { store, config }
    }

    /// Attempt to consume a single token for `key`.
    pub async fn allow(&self, key: &str) -> CoreResult<AllowResult> {
        self.allow_n(key, 1).await
    }

    /// Attempt to consume `n` tokens for `key`. `n` must be positive.
    pub async fn allow_n(&self, key: &str, n: i64) -> CoreResult<AllowResult> {
        if n <= 0 {
            return Err(CoreError::InvalidTokenCount(n));
        }
        let (remaining, reset_at) = self.store.consume_tokens(key, n, &self.config).await?;
        Ok(AllowResult {
            limit: self.config.capacity,
            remaining,
            reset_at,
        })
    }

    /// Inspect `key`'s current state without consuming any tokens.
    pub async fn status(&self, key: &str) -> CoreResult<AllowResult> {
        let (remaining, reset_at) = self.store.consume_tokens(key, 0, &self.config).await?;
        Ok(AllowResult {
            limit: self.config.capacity,
            remaining,
            reset_at,
        })
    }

    /// Reset `key` to a fresh, full bucket.
    pub async fn reset(&self, key: &str) -> CoreResult<()> {
        self.store.reset(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::store::InMemoryRateLimitStore;
    use std::time::Duration;

    fn limiter() -> RateLimiter {
        let config = RateLimitConfig::new(3, 3, Duration::from_millis(100)).unwrap();
        RateLimiter::new(config, Arc::new(InMemoryRateLimitStore::with_sweep_period(Duration::ZERO)))
    }

    #[tokio::test]
    async fn allow_admits_until_capacity_exhausted() {
        let limiter = limiter();
        for _ in 0..3 {
            assert!(limiter.allow("k").await.unwrap().allowed());
        }
        assert!(!limiter.allow("k").await.unwrap().allowed());
    }

    #[tokio::test]
    async fn allow_n_rejects_non_positive_counts() {
        let limiter = limiter();
        assert!(limiter.allow_n("k", 0).await.is_err());
        assert!(limiter.allow_n("k", -1).await.is_err());
    }

    #[tokio::test]
    async fn status_does_not_consume_tokens() {
        let limiter = limiter();
        limiter.status("k").await.unwrap();
        let result = limiter.allow_n("k", 3).await.unwrap();
        assert!(result.allowed());
    }

    #[tokio::test]
    async fn reset_restores_full_capacity() {
        let limiter = limiter();
        limiter.allow_n("k", 3).await.unwrap();
        limiter.reset("k").await.unwrap();
        assert!(limiter.allow_n("k", 3).await.unwrap().allowed());
    }

    #[tokio::test]
    async fn retry_after_is_none_when_allowed() {
        let limiter = limiter();
        let result = limiter.allow("k").await.unwrap();
        assert!(result.retry_after(Utc::now()).is_none());
    }

    #[tokio::test]
    async fn retry_after_is_some_when_rejected() {
        let limiter = limiter();
        limiter.allow_n("k", 3).await.unwrap();
        let rejected = limiter.allow("k").await.unwrap();
        assert!(rejected.retry_after(Utc::now()).is_some());
    }
}
