//! Token-bucket rate limiting (§3, §4.3): pure bucket arithmetic, a
//! pluggable store, a limiter façade, composite key construction, and
//! HTTP admission middleware.

mod bucket;
mod key;
mod limiter;
mod middleware;
mod store;

pub use bucket::RateLimitConfig;
pub use key::build_key;
pub use limiter::{AllowResult, RateLimiter};
pub use middleware::{rate_limit_middleware, rate_limit_middleware_with_responder, KeyExtractor, RejectionResponder};
pub use store::{InMemoryRateLimitStore, RateLimitStore, DEFAULT_SWEEP_PERIOD};
