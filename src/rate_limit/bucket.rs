//! Token-bucket configuration and the pure refill/consume arithmetic
//! (§4.3). Kept separate from storage so the math is unit-testable without
//! a store or a clock dependency beyond `chrono::DateTime<Utc>`.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};

/// Token-bucket parameters, validated at construction (§4.3).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum tokens a bucket can hold.
    pub capacity: i64,
    /// Tokens added per refill interval.
    pub refill_rate: i64,
    /// Wall-clock period between refills.
    pub refill_interval: std::time::Duration,
}

impl RateLimitConfig {
    /// Validate `capacity`, `refill_rate`, `refill_interval` are all
    /// positive; returns [`CoreError::InvalidConfig`] otherwise.
    pub fn new(capacity: i64, refill_rate: i64, refill_interval: std::time::Duration) -> CoreResult<Self> {
        if capacity <= 0 {
            return Err(CoreError::InvalidConfig("capacity must be positive".into()));
        }
        if refill_rate <= 0 {
            return Err(CoreError::InvalidConfig("refill_rate must be positive".into()));
        }
        if refill_interval.is_zero() {
            return Err(CoreError::InvalidConfig("refill_interval must be positive".into()));
        }
        Ok(Self {
            capacity,
            refill_rate,
            refill_interval,
        })
    }

    /// Cap on the number of elapsed intervals applied in one refill, so a
    /// bucket idle for a very long time can't overflow `tokens` arithmetic.
    fn max_intervals(&self) -> i64 {
        self.capacity.div_ceil(self.refill_rate) + 1
    }
}

/// Per-key token-bucket state (§3).
#[derive(Debug, Clone, Copy)]
pub struct BucketState {
    /// Current token count. May be negative (overdraft).
    pub tokens: i64,
    /// Absolute time of the last refill.
    pub last_refill: DateTime<Utc>,
    /// Absolute time of the last touch (refill or consume), used by the
    /// store's staleness sweeper.
    pub last_access: DateTime<Utc>,
}

impl BucketState {
    /// A fresh bucket, full, as of `now`.
    pub fn new(config: &RateLimitConfig, now: DateTime<Utc>) -> Self {
        Self {
            tokens: config.capacity,
            last_refill: now,
            last_access: now,
        }
    }

    /// Apply the refill-then-consume step (§4.3) and return
    /// `(remaining, reset_at)`. `requested` may be `0` for a status probe.
    pub fn consume(&mut self, config: &RateLimitConfig, requested: i64, now: DateTime<Utc>) -> (i64, DateTime<Utc>) {
        let elapsed = now.signed_duration_since(self.last_refill);
        let interval_ms = config.refill_interval.as_millis().max(1) as i64;
        let elapsed_ms = elapsed.num_milliseconds().max(0);
        let intervals = (elapsed_ms / interval_ms).min(config.max_intervals());
        if intervals > 0 {
            self.tokens = (self.tokens + intervals * config.refill_rate).min(config.capacity);
            self.last_refill = now; // absolute, not additive, to avoid drift
        }
        self.tokens -= requested;
        self.last_access = now;
        let reset_at = self.last_refill + config.refill_interval;
        (self.tokens, reset_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> RateLimitConfig {
        RateLimitConfig::new(5, 5, Duration::from_millis(100)).unwrap()
    }

    #[test]
    fn construction_rejects_non_positive_fields() {
        assert!(RateLimitConfig::new(0, 1, Duration::from_secs(1)).is_err());
        assert!(RateLimitConfig::new(1, 0, Duration::from_secs(1)).is_err());
        assert!(RateLimitConfig::new(1, 1, Duration::ZERO).is_err());
    }

    #[test]
    fn s5_refill_after_exhaustion() {
        let config = config();
        let t0 = Utc::now();
        let mut bucket = BucketState::new(&config, t0);
        let (remaining, _) = bucket.consume(&config, 5, t0);
        assert_eq!(remaining, 0);
        let (remaining, reset_at) = bucket.consume(&config, 1, t0);
        assert_eq!(remaining, -1);
        assert!(reset_at >= t0);
        let t1 = t0 + chrono::Duration::milliseconds(150);
        let (remaining, _) = bucket.consume(&config, 1, t1);
        assert_eq!(remaining, 4);
    }

    #[test]
    fn status_probe_does_not_consume() {
        let config = config();
        let t0 = Utc::now();
        let mut bucket = BucketState::new(&config, t0);
        let (remaining, _) = bucket.consume(&config, 0, t0);
        assert_eq!(remaining, 5);
    }

    #[test]
    fn long_idle_bucket_refills_to_capacity_without_overflow() {
        let config = config();
        let t0 = Utc::now();
        let mut bucket = BucketState::new(&config, t0);
        bucket.consume(&config, 5, t0);
        let far_future = t0 + chrono::Duration::days(365);
        let (remaining, _) = bucket.consume(&config, 0, far_future);
        assert_eq!(remaining, config.capacity);
    }

    #[test]
    fn invariant_tokens_never_exceed_capacity() {
        let config = config();
        let t0 = Utc::now();
        let mut bucket = BucketState::new(&config, t0);
        let t1 = t0 + chrono::Duration::seconds(10);
        let (remaining, _) = bucket.consume(&config, 0, t1);
        assert!(remaining.max(0) <= config.capacity);
    }
}
