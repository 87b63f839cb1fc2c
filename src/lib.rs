#![warn(missing_docs)]
//! # saas-core
//!
//! A runtime substrate for multi-tenant SaaS backends, built around four
//! cooperating subsystems:
//!
//! - [`broadcast`] — a generic, in-process publish/subscribe hub with
//!   slow-consumer eviction, optional durability and replay, and
//!   acknowledged delivery with bounded retries.
//! - [`notification`] — durable, user-addressed notifications layered on
//!   top of the broadcast hub for real-time fan-out.
//! - [`rate_limit`] — a token-bucket rate limiter with a pluggable store
//!   and HTTP admission middleware.
//! - [`tenant`] — request-scoped tenant resolution (subdomain, header, or
//!   path) backed by a provider and an optional cache.
//!
//! ## Architecture
//!
//! ```text
//! incoming request
//!        │
//!        ▼
//! ┌─────────────────┐     ┌──────────────────┐     ┌────────────────┐
//! │  TenantRouter    │────▶│   RateLimiter     │────▶│    handler     │
//! │  (tenant)        │     │   (rate_limit)    │     │                │
//! └─────────────────┘     └──────────────────┘     └───────┬────────┘
//!                                                           │
//!                                                           ▼
//!                                                  ┌───────────────────┐
//!                                                  │  NotificationCore  │
//!                                                  │  (notification)    │
//!                                                  └─────────┬─────────┘
//!                                                             │
//!                                                             ▼
//!                                                  ┌───────────────────┐
//!                                                  │   BroadcastHub     │
//!                                                  │   (broadcast)      │
//!                                                  └─────────┬─────────┘
//!                                                             │
//!                                                             ▼
//!                                                  subscriber stream
//!                                                  (SSE / WebSocket / …)
//! ```
//!
//! Each subsystem is usable on its own: a caller that only needs the
//! broadcast hub never has to wire up tenant resolution or rate limiting.
//!
//! ## Error handling
//!
//! Every subsystem returns [`error::CoreResult<T>`] rather than its own
//! error type, so call sites that compose more than one subsystem don't
//! juggle several incompatible error enums.
//!
//! ## Logging
//!
//! All four subsystems log through `tracing` directly; there is no
//! bespoke `Logger` trait. Call sites install whichever `tracing`
//! subscriber fits their deployment (`tracing-subscriber`, an OpenTelemetry
//! exporter, …).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use saas_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> saas_core::error::CoreResult<()> {
//! let hub: BroadcastHub<String> = BroadcastHub::new(HubConfig::new());
//! let ctx = RequestContext::new();
//! let mut subscriber = hub.subscribe(&ctx, "updates", SubscribeOptions::default()).await?;
//! hub.publish(&ctx, "updates", "hello".to_string(), PublishOptions::new()).await?;
//! let message = subscriber.recv().await;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod context;
pub mod error;
pub mod http;
pub mod notification;
pub mod rate_limit;
pub mod tenant;

/// Prelude for convenient imports.
///
/// ```rust,ignore
/// use saas_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::broadcast::{
        AckSubscriber, BroadcastHub, HubConfig, InMemoryMessageStore, LoadOptions, Message, MessageStore,
        PublishOptions, SubscribeOptions, Subscriber,
    };
    pub use crate::context::RequestContext;
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::http::{Context, MiddlewareFn, Next, Request, Response, from_fn};
    pub use crate::notification::{
        Action, BroadcastDeliverer, Deliverer, FanOutDeliverer, InMemoryNotificationStore, ListOptions, Manager,
        NoopDeliverer, Notification, NotificationStore, NotificationType, Priority,
    };
    pub use crate::rate_limit::{
        AllowResult, InMemoryRateLimitStore, RateLimitConfig, RateLimitStore, RateLimiter, build_key,
        rate_limit_middleware,
    };
    pub use crate::tenant::{
        CompositeResolver, HeaderResolver, InMemoryTenantCache, NoopTenantCache, PathResolver, Resolver,
        SubdomainResolver, Tenant, TenantCache, TenantMiddlewareConfig, TenantProvider, TenantSlot,
        require_tenant_middleware, tenant_middleware,
    };
}
