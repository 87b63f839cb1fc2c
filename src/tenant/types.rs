//! Tenant record type (§3, §4.4).

use chrono::{DateTime, Utc};

/// An isolation unit resolved from an incoming request.
#[derive(Debug, Clone, PartialEq)]
pub struct Tenant {
    /// Opaque identifier, typically a UUID.
    pub id: String,
    /// Human-readable resolution label, e.g. the subdomain.
    pub resolution_label: String,
    /// Display name shown in UIs.
    pub display_name: String,
    /// Optional logo URL.
    pub logo_url: Option<String>,
    /// Plan identifier, e.g. `"pro"`.
    pub plan_id: String,
    /// Whether the tenant currently accepts traffic.
    pub active: bool,
    /// When the tenant record was created.
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Construct a new, active tenant with the given identifier and
    /// resolution label; other fields default to empty/now.
    pub fn new(id: impl Into<String>, resolution_label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resolution_label: resolution_label.into(),
            display_name: String::new(),
            logo_url: None,
            plan_id: String::new(),
            active: true,
            created_at: Utc::now(),
        }
    }
}
