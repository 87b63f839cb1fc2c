//! Authoritative tenant lookup (§4.4, §6).

use super::types::Tenant;
use crate::error::CoreResult;

/// The source of truth for tenant records. Lookup misses are represented
/// by [`crate::error::CoreError::TenantNotFound`], not by an `Option`, so
/// providers share the crate's error taxonomy with every other store.
#[async_trait::async_trait]
pub trait TenantProvider: Send + Sync {
    /// Look up a tenant by its resolved identifier.
    async fn get_by_identifier(&self, identifier: &str) -> CoreResult<Tenant>;
}
