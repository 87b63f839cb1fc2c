//! Error taxonomy shared by all four subsystems.
//!
//! Every subsystem returns [`CoreResult<T>`] rather than inventing its own
//! error type; this keeps call sites that compose more than one subsystem
//! (e.g. a handler that rate-limits, then publishes a notification) from
//! having to juggle several incompatible error enums.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by any of the four subsystems.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// Publish or subscribe attempted after the hub was closed.
    #[error("hub is closed")]
    HubClosed,

    /// Operation attempted on a subscriber that has already closed.
    #[error("subscriber is closed")]
    SubscriberClosed,

    /// Channel does not exist in a store that materializes channels.
    #[error("channel {0:?} not found")]
    ChannelNotFound(String),

    /// An injected store failed; `op` names the failing operation, `source`
    /// preserves the original cause for chain walking.
    #[error("storage operation {op:?} failed")]
    StorageFailure {
        /// Name of the store operation that failed (e.g. `"Store"`, `"Load"`).
        op: String,
        /// Underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An explicit publish deadline was exceeded.
    #[error("publish to channel {channel:?} timed out after {duration:?}")]
    PublishTimeout {
        /// Channel being published to.
        channel: String,
        /// Configured timeout.
        duration: Duration,
    },

    /// Hub close did not complete within the configured shutdown deadline.
    #[error("hub shutdown did not complete in time")]
    ShutdownTimeout,

    /// The calling context was cancelled while an operation was in flight.
    #[error("operation cancelled")]
    ContextCancelled,

    /// Rate limiter configuration failed validation.
    #[error("invalid rate limiter configuration: {0}")]
    InvalidConfig(String),

    /// `AllowN` called with a non-positive token count.
    #[error("token count must be positive, got {0}")]
    InvalidTokenCount(i64),

    /// The rate limiter's store is unavailable.
    #[error("rate limit store unavailable: {0}")]
    StoreUnavailable(String),

    /// Notification lookup missed.
    #[error("notification {0:?} not found")]
    NotificationNotFound(String),

    /// Tenant lookup missed.
    #[error("tenant {0:?} not found")]
    TenantNotFound(String),

    /// A resolver produced a syntactically invalid tenant identifier.
    #[error("invalid tenant identifier: {0:?}")]
    InvalidIdentifier(String),

    /// `RequireTenant` middleware ran with no tenant in context.
    #[error("no tenant in request context")]
    NoTenantInContext,

    /// Tenant exists but is not active.
    #[error("tenant {0:?} is inactive")]
    InactiveTenant(String),
}

/// Result alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Wrap a store error as a [`CoreError::StorageFailure`], preserving it
    /// as the source for cause-chain walking.
    pub fn storage_failure(
        op: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StorageFailure {
            op: op.into(),
            source: Box::new(source),
        }
    }
}
