//! HTTP admission middleware built on [`crate::http`] (§4.3).

use super::limiter::RateLimiter;
use crate::http::{Context, MiddlewareFn, Next, Request, Response, from_fn};
use std::sync::Arc;

/// Derives the rate-limit key for an inbound request.
pub type KeyExtractor<Ctx> = Arc<dyn Fn(&Context<Ctx>, &Request) -> String + Send + Sync>;

/// Builds the response returned when a request is rejected. Receives the
/// `Retry-After` seconds that were already attached as a header.
pub type RejectionResponder = Arc<dyn Fn(u64) -> Response + Send + Sync>;

fn default_rejection(retry_after_secs: u64) -> Response {
    let response = Response::with_status(429);
    if retry_after_secs > 0 {
        response.with_header("Retry-After", retry_after_secs.to_string())
    } else {
        response
    }
}

/// Build admission middleware that consumes one token per request from
/// `limiter`, keyed by `key_of`. Every response (allowed or rejected) gets
/// `X-RateLimit-Limit`/`X-RateLimit-Remaining`/`X-RateLimit-Reset`; a
/// rejection additionally gets `Retry-After` and, by default, a bare 429.
/// A limiter error maps to a 500, never silently admitting the request.
pub fn rate_limit_middleware<Ctx>(limiter: Arc<RateLimiter>, key_of: KeyExtractor<Ctx>) -> MiddlewareFn<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
{
    rate_limit_middleware_with_responder(limiter, key_of, Arc::new(default_rejection))
}

/// As [`rate_limit_middleware`], but with a customizable rejection response.
pub fn rate_limit_middleware_with_responder<Ctx>(
    limiter: Arc<RateLimiter>,
    key_of: KeyExtractor<Ctx>,
    on_reject: RejectionResponder,
) -> MiddlewareFn<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
{
    from_fn(move |ctx: Context<Ctx>, req: Request, next: Next<Ctx>| {
        let limiter = limiter.clone();
        let key_of = key_of.clone();
        let on_reject = on_reject.clone();
        async move {
            let key = key_of(&ctx, &req);
            let result = match limiter.allow(&key).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(error = %err, "rate limit check failed");
                    return Err(Response::with_status(500));
                }
            };
            let reset_secs = result
                .reset_at
                .signed_duration_since(chrono::Utc::now())
                .num_seconds()
                .max(0) as u64;

            let annotate = |response: Response| -> Response {
                response
                    .with_header("X-RateLimit-Limit", result.limit.to_string())
                    .with_header("X-RateLimit-Remaining", result.remaining.max(0).to_string())
                    .with_header("X-RateLimit-Reset", reset_secs.to_string())
            };

            if !result.allowed() {
                let rejection = annotate(on_reject(reset_secs));
                let rejection = if reset_secs > 0 {
                    rejection.with_header("Retry-After", reset_secs.to_string())
                } else {
                    rejection
                };
                return Err(rejection);
            }

            match next(ctx, req).await {
                Ok(response) => Ok(annotate(response)),
                Err(response) => Err(annotate(response)),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::bucket::RateLimitConfig;
    use crate::rate_limit::store::InMemoryRateLimitStore;
    use std::time::Duration;

    fn limiter(capacity: i64) -> Arc<RateLimiter> {
        let config = RateLimitConfig::new(capacity, capacity, Duration::from_secs(1)).unwrap();
        Arc::new(RateLimiter::new(config, Arc::new(InMemoryRateLimitStore::with_sweep_period(Duration::ZERO))))
    }

    fn terminal() -> Next<()> {
        Arc::new(|_ctx, _req| Box::pin(async { Ok(Response::ok()) }))
    }

    fn key_extractor() -> KeyExtractor<()> {
        Arc::new(|_ctx, _req| "fixed-key".to_string())
    }

    #[tokio::test]
    async fn allowed_request_passes_through_with_headers() {
        let mw = rate_limit_middleware(limiter(5), key_extractor());
        let ctx = Context::new(());
        let result = mw(ctx, Request::new("h", "/"), terminal()).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(result.headers.get("X-RateLimit-Limit").unwrap(), "5");
    }

    #[tokio::test]
    async fn exhausted_bucket_returns_429_with_retry_after() {
        let mw = rate_limit_middleware(limiter(1), key_extractor());
        let ctx = Context::new(());
        mw(ctx.clone(), Request::new("h", "/"), terminal()).await.unwrap();
        let rejected = mw(ctx, Request::new("h", "/"), terminal()).await.unwrap_err();
        assert_eq!(rejected.status, 429);
        assert!(rejected.headers.contains_key("Retry-After"));
    }

    #[tokio::test]
    async fn sub_second_retry_after_is_omitted_not_zero() {
        let config = RateLimitConfig::new(1, 1, Duration::from_millis(500)).unwrap();
        let limiter = Arc::new(RateLimiter::new(
            config,
            Arc::new(InMemoryRateLimitStore::with_sweep_period(Duration::ZERO)),
        ));
        let mw = rate_limit_middleware(limiter, key_extractor());
        let ctx = Context::new(());
        mw(ctx.clone(), Request::new("h", "/"), terminal()).await.unwrap();
        let rejected = mw(ctx, Request::new("h", "/"), terminal()).await.unwrap_err();
        assert_eq!(rejected.status, 429);
        assert!(
            !rejected.headers.contains_key("Retry-After"),
            "a reset under one second must omit Retry-After, not send 0"
        );
    }

    #[tokio::test]
    async fn custom_rejection_responder_is_used() {
        let mw = rate_limit_middleware_with_responder(
            limiter(1),
            key_extractor(),
            Arc::new(|_secs| Response::with_status(503)),
        );
        let ctx = Context::new(());
        mw(ctx.clone(), Request::new("h", "/"), terminal()).await.unwrap();
        let rejected = mw(ctx, Request::new("h", "/"), terminal()).await.unwrap_err();
        assert_eq!(rejected.status, 503);
    }
}
