//! Acceleration layer in front of a [`TenantProvider`](super::provider::TenantProvider) (§4.4, §6).

use super::types::Tenant;
use crate::error::CoreResult;
use dashmap::DashMap;

/// An optional cache in front of the tenant provider. Treated as
/// thread-safe by contract (§5); provider calls are never deduplicated
/// against a cache miss (no single-flight).
#[async_trait::async_trait]
pub trait TenantCache: Send + Sync {
    /// Look up `key`, returning `None` on a miss.
    async fn get(&self, key: &str) -> CoreResult<Option<Tenant>>;
    /// Populate the cache for `key`.
    async fn set(&self, key: &str, tenant: Tenant) -> CoreResult<()>;
    /// Evict `key`.
    async fn delete(&self, key: &str) -> CoreResult<()>;
}

/// Disables caching: every lookup is a miss, every write and delete a no-op.
pub struct NoopTenantCache;

#[async_trait::async_trait]
impl TenantCache for NoopTenantCache {
    async fn get(&self, _key: &str) -> CoreResult<Option<Tenant>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _tenant: Tenant) -> CoreResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CoreResult<()> {
        Ok(())
    }
}

/// An in-memory cache with no eviction policy of its own; callers that
/// need bounded memory should front it with their own expiry sweep or
/// choose a different implementation.
#[derive(Default)]
pub struct InMemoryTenantCache {
    entries: DashMap<String, Tenant>,
}

impl InMemoryTenantCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TenantCache for InMemoryTenantCache {
    async fn get(&self, key: &str) -> CoreResult<Option<Tenant>> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &str, tenant: Tenant) -> CoreResult<()> {
        self.entries.insert(key.to_string(), tenant);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_cache_is_always_a_miss() {
        let cache = NoopTenantCache;
        cache.set("k", Tenant::new("1", "acme")).await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_cache_round_trips() {
        let cache = InMemoryTenantCache::new();
        cache.set("k", Tenant::new("1", "acme")).await.unwrap();
        let hit = cache.get("k").await.unwrap().unwrap();
        assert_eq!(hit.resolution_label, "acme");
    }

    #[tokio::test]
    async fn in_memory_cache_delete_evicts() {
        let cache = InMemoryTenantCache::new();
        cache.set("k", Tenant::new("1", "acme")).await.unwrap();
        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }
}
