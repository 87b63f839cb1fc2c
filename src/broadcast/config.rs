//! Hub configuration, with the defaults from §4.1 of the spec.

use std::time::Duration;

/// Configuration for a [`crate::broadcast::BroadcastHub`].
///
/// Zero or negative durations/sizes are replaced with the documented
/// default at construction time rather than rejected.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Default buffer size for subscribers that don't request one.
    pub buffer_size: usize,
    /// Per-subscriber slow-consumer timeout.
    pub slow_consumer_timeout: Duration,
    /// Deadline for `Close()` to finish waiting on background activity.
    pub shutdown_deadline: Duration,
    /// Deadline for a replay load to finish.
    pub replay_deadline: Duration,
    /// Default ack timeout for `SubscribeWithAck`.
    pub ack_timeout: Duration,
    /// Default max retries before an ack times out permanently.
    pub max_retries: u32,
    /// Period of the empty-channel cleanup sweep. `None` disables it.
    pub cleanup_period: Option<Duration>,
}

impl HubConfig {
    /// Defaults: buffer 100, slow-consumer 5s, shutdown 30s, replay 10s,
    /// ack timeout 30s, max retries 3, cleanup disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the default subscriber buffer size. Clamped to at least 1.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Override the slow-consumer timeout. Zero falls back to the default.
    pub fn with_slow_consumer_timeout(mut self, timeout: Duration) -> Self {
        self.slow_consumer_timeout = non_zero_or(timeout, Self::default().slow_consumer_timeout);
        self
    }

    /// Override the shutdown deadline. Zero falls back to the default.
    pub fn with_shutdown_deadline(mut self, deadline: Duration) -> Self {
        self.shutdown_deadline = non_zero_or(deadline, Self::default().shutdown_deadline);
        self
    }

    /// Override the replay deadline. Zero falls back to the default.
    pub fn with_replay_deadline(mut self, deadline: Duration) -> Self {
        self.replay_deadline = non_zero_or(deadline, Self::default().replay_deadline);
        self
    }

    /// Override the default ack timeout. Zero falls back to the default.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = non_zero_or(timeout, Self::default().ack_timeout);
        self
    }

    /// Override the default max retry count.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Enable periodic cleanup of empty channels. `period <= 0` disables it.
    pub fn with_cleanup_period(mut self, period: Duration) -> Self {
        self.cleanup_period = if period.is_zero() { None } else { Some(period) };
        self
    }
}

fn non_zero_or(value: Duration, default: Duration) -> Duration {
    if value.is_zero() { default } else { value }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            buffer_size: 100,
            slow_consumer_timeout: Duration::from_secs(5),
            shutdown_deadline: Duration::from_secs(30),
            replay_deadline: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(30),
            max_retries: 3,
            cleanup_period: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let config = HubConfig::new()
            .with_slow_consumer_timeout(Duration::ZERO)
            .with_shutdown_deadline(Duration::ZERO);
        assert_eq!(config.slow_consumer_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_deadline, Duration::from_secs(30));
    }

    #[test]
    fn buffer_size_clamps_to_one() {
        let config = HubConfig::new().with_buffer_size(0);
        assert_eq!(config.buffer_size, 1);
    }

    #[test]
    fn cleanup_period_zero_disables() {
        let config = HubConfig::new().with_cleanup_period(Duration::ZERO);
        assert!(config.cleanup_period.is_none());
        let config = HubConfig::new().with_cleanup_period(Duration::from_secs(1));
        assert!(config.cleanup_period.is_some());
    }
}
