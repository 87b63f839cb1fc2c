//! Tenant resolution middleware (§4.4): the 7-step flow from resolver
//! chain through cache, provider, and active-tenant enforcement.

use super::cache::TenantCache;
use super::provider::TenantProvider;
use super::resolver::Resolver;
use super::types::Tenant;
use crate::error::CoreError;
use crate::http::{Context, MiddlewareFn, Next, Request, Response, from_fn};
use std::sync::Arc;

/// Application state that can carry a resolved tenant through a request.
/// Implemented by callers' own context type so the middleware stays
/// generic over `Ctx`, the same way [`crate::http::Context`] does.
pub trait TenantSlot {
    /// Attach (or clear) the resolved tenant.
    fn set_tenant(&mut self, tenant: Option<Tenant>);
    /// The tenant resolved earlier in the chain, if any.
    fn tenant(&self) -> Option<Tenant>;
}

/// Configuration for [`tenant_middleware`].
#[derive(Clone)]
pub struct TenantMiddlewareConfig {
    /// Paths that bypass resolution entirely.
    pub skip_paths: Vec<String>,
    /// Whether an inactive tenant is rejected with 403 (default `true`).
    pub require_active: bool,
}

impl TenantMiddlewareConfig {
    /// Defaults: no skipped paths, active tenants required.
    pub fn new() -> Self {
        Self {
            skip_paths: Vec::new(),
            require_active: true,
        }
    }

    /// Paths bypassing tenant resolution.
    pub fn with_skip_paths(mut self, paths: Vec<String>) -> Self {
        self.skip_paths = paths;
        self
    }

    /// Whether inactive tenants are rejected.
    pub fn with_require_active(mut self, require_active: bool) -> Self {
        self.require_active = require_active;
        self
    }
}

impl Default for TenantMiddlewareConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn status_for(err: &CoreError) -> Response {
    match err {
        CoreError::TenantNotFound(_) => Response::with_status(404),
        CoreError::InvalidIdentifier(_) => Response::with_status(500),
        _ => Response::with_status(500),
    }
}

/// Build the tenant resolution middleware described in §4.4.
pub fn tenant_middleware<Ctx>(
    resolver: Arc<dyn Resolver>,
    provider: Arc<dyn TenantProvider>,
    cache: Arc<dyn TenantCache>,
    config: TenantMiddlewareConfig,
) -> MiddlewareFn<Ctx>
where
    Ctx: TenantSlot + Clone + Send + Sync + 'static,
{
    from_fn(move |mut ctx: Context<Ctx>, req: Request, next: Next<Ctx>| {
        let resolver = resolver.clone();
        let provider = provider.clone();
        let cache = cache.clone();
        let config = config.clone();
        async move {
            if config.skip_paths.iter().any(|p| p == &req.path) {
                return next(ctx, req).await;
            }

            let identifier = match resolver.resolve(&req) {
                Ok(identifier) => identifier,
                Err(err) => {
                    tracing::warn!(error = %err, "tenant resolution failed");
                    return Err(Response::with_status(500));
                }
            };

            if identifier.is_empty() {
                return next(ctx, req).await;
            }

            let cached = cache.get(&identifier).await.unwrap_or(None);
            let tenant = if let Some(tenant) = cached {
                tenant
            } else {
                let tenant = match provider.get_by_identifier(&identifier).await {
                    Ok(tenant) => tenant,
                    Err(err) => {
                        tracing::warn!(identifier = %identifier, error = %err, "tenant provider lookup failed");
                        return Err(status_for(&err));
                    }
                };
                if let Err(err) = cache.set(&identifier, tenant.clone()).await {
                    tracing::warn!(identifier = %identifier, error = %err, "failed to populate tenant cache");
                }
                tenant
            };

            if config.require_active && !tenant.active {
                return Err(Response::with_status(403));
            }

            ctx.state.set_tenant(Some(tenant));
            next(ctx, req).await
        }
    })
}

/// Rejects (500 by default) any request that reaches it without a tenant
/// already resolved in context.
pub fn require_tenant_middleware<Ctx>() -> MiddlewareFn<Ctx>
where
    Ctx: TenantSlot + Clone + Send + Sync + 'static,
{
    from_fn(move |ctx: Context<Ctx>, req: Request, next: Next<Ctx>| async move {
        if ctx.state.tenant().is_none() {
            return Err(Response::with_status(500));
        }
        next(ctx, req).await
    })
}

/// Exposes the resolved tenant's identifier for a logging façade, without
/// requiring logging code to depend on the full [`TenantSlot`] trait.
pub fn tenant_id_for_logging<Ctx: TenantSlot>(ctx: &Context<Ctx>) -> Option<String> {
    ctx.state.tenant().map(|t| t.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::cache::{InMemoryTenantCache, NoopTenantCache};
    use crate::tenant::provider::test_support::StaticProvider;
    use crate::tenant::resolver::HeaderResolver;

    #[derive(Clone, Default)]
    struct TestCtx {
        tenant: Option<Tenant>,
    }

    impl TenantSlot for TestCtx {
        fn set_tenant(&mut self, tenant: Option<Tenant>) {
            self.tenant = tenant;
        }
        fn tenant(&self) -> Option<Tenant> {
            self.tenant.clone()
        }
    }

    fn terminal() -> Next<TestCtx> {
        Arc::new(|_ctx, _req| Box::pin(async { Ok(Response::ok()) }))
    }

    #[tokio::test]
    async fn empty_identifier_passes_through_with_no_tenant() {
        let mw = tenant_middleware(
            Arc::new(HeaderResolver::new()),
            Arc::new(StaticProvider::new(vec![])),
            Arc::new(NoopTenantCache),
            TenantMiddlewareConfig::new(),
        );
        let ctx = Context::new(TestCtx::default());
        let result = mw(ctx, Request::new("h", "/"), terminal()).await.unwrap();
        assert_eq!(result.status, 200);
    }

    #[tokio::test]
    async fn unknown_tenant_is_404() {
        let mw = tenant_middleware(
            Arc::new(HeaderResolver::new()),
            Arc::new(StaticProvider::new(vec![])),
            Arc::new(NoopTenantCache),
            TenantMiddlewareConfig::new(),
        );
        let ctx = Context::new(TestCtx::default());
        let req = Request::new("h", "/").with_header("X-Tenant-ID", "acme");
        let result = mw(ctx, req, terminal()).await.unwrap_err();
        assert_eq!(result.status, 404);
    }

    #[tokio::test]
    async fn inactive_tenant_is_403_when_required_active() {
        let mut tenant = Tenant::new("1", "acme");
        tenant.active = false;
        let mw = tenant_middleware(
            Arc::new(HeaderResolver::new()),
            Arc::new(StaticProvider::new(vec![tenant])),
            Arc::new(NoopTenantCache),
            TenantMiddlewareConfig::new(),
        );
        let ctx = Context::new(TestCtx::default());
        let req = Request::new("h", "/").with_header("X-Tenant-ID", "acme");
        let result = mw(ctx, req, terminal()).await.unwrap_err();
        assert_eq!(result.status, 403);
    }

    #[tokio::test]
    async fn inactive_tenant_allowed_when_require_active_is_false() {
        let mut tenant = Tenant::new("1", "acme");
        tenant.active = false;
        let mw = tenant_middleware(
            Arc::new(HeaderResolver::new()),
            Arc::new(StaticProvider::new(vec![tenant])),
            Arc::new(NoopTenantCache),
            TenantMiddlewareConfig::new().with_require_active(false),
        );
        let ctx = Context::new(TestCtx::default());
        let req = Request::new("h", "/").with_header("X-Tenant-ID", "acme");
        let result = mw(ctx, req, terminal()).await.unwrap();
        assert_eq!(result.status, 200);
    }

    #[tokio::test]
    async fn active_tenant_is_attached_to_context() {
        let tenant = Tenant::new("1", "acme");
        let mw = tenant_middleware(
            Arc::new(HeaderResolver::new()),
            Arc::new(StaticProvider::new(vec![tenant])),
            Arc::new(NoopTenantCache),
            TenantMiddlewareConfig::new(),
        );
        let ctx = Context::new(TestCtx::default());
        let req = Request::new("h", "/").with_header("X-Tenant-ID", "acme");
        let captured: Arc<std::sync::Mutex<Option<Tenant>>> = Arc::new(std::sync::Mutex::new(None));
        let captured_clone = captured.clone();
        let terminal: Next<TestCtx> = Arc::new(move |ctx, _req| {
            let captured = captured_clone.clone();
            Box::pin(async move {
                *captured.lock().unwrap() = ctx.state.tenant();
                Ok(Response::ok())
            })
        });
        mw(ctx, req, terminal).await.unwrap();
        assert_eq!(captured.lock().unwrap().as_ref().unwrap().resolution_label, "acme");
    }

    #[tokio::test]
    async fn cache_hit_skips_provider() {
        let cache = Arc::new(InMemoryTenantCache::new());
        cache.set("acme", Tenant::new("1", "acme")).await.unwrap();
        let mw = tenant_middleware(
            Arc::new(HeaderResolver::new()),
            Arc::new(StaticProvider::new(vec![])), // provider has nothing; cache must serve it
            cache,
            TenantMiddlewareConfig::new(),
        );
        let ctx = Context::new(TestCtx::default());
        let req = Request::new("h", "/").with_header("X-Tenant-ID", "acme");
        let result = mw(ctx, req, terminal()).await.unwrap();
        assert_eq!(result.status, 200);
    }

    #[tokio::test]
    async fn skip_path_bypasses_resolution_entirely() {
        let mw = tenant_middleware(
            Arc::new(HeaderResolver::new()),
            Arc::new(StaticProvider::new(vec![])),
            Arc::new(NoopTenantCache),
            TenantMiddlewareConfig::new().with_skip_paths(vec!["/healthz".to_string()]),
        );
        let ctx = Context::new(TestCtx::default());
        let req = Request::new("h", "/healthz").with_header("X-Tenant-ID", "-bad");
        let result = mw(ctx, req, terminal()).await.unwrap();
        assert_eq!(result.status, 200);
    }

    #[tokio::test]
    async fn require_tenant_middleware_rejects_missing_tenant() {
        let mw = require_tenant_middleware::<TestCtx>();
        let ctx = Context::new(TestCtx::default());
        let result = mw(ctx, Request::new("h", "/"), terminal()).await.unwrap_err();
        assert_eq!(result.status, 500);
    }

    #[tokio::test]
    async fn require_tenant_middleware_passes_when_present() {
        let mw = require_tenant_middleware::<TestCtx>();
        let mut state = TestCtx::default();
        state.set_tenant(Some(Tenant::new("1", "acme")));
        let ctx = Context::new(state);
        let result = mw(ctx, Request::new("h", "/"), terminal()).await.unwrap();
        assert_eq!(result.status, 200);
    }
}
