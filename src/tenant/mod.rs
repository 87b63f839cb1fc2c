//! TenantRouter (§4.4): resolver chain, provider, cache, and request
//! middleware that injects a resolved tenant into request-scoped context.

mod cache;
mod middleware;
mod provider;
mod resolver;
mod types;

pub use cache::{InMemoryTenantCache, NoopTenantCache, TenantCache};
pub use middleware::{
    require_tenant_middleware, tenant_id_for_logging, tenant_middleware, TenantMiddlewareConfig, TenantSlot,
};
pub use provider::TenantProvider;
pub use resolver::{CompositeResolver, HeaderResolver, PathResolver, Resolver, SubdomainResolver};
pub use types::Tenant;
