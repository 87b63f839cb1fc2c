//! Tenant identifier resolution from inbound requests (§4.4).

use crate::error::{CoreError, CoreResult};
use crate::http::Request;
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*$").expect("valid regex"));

/// Validate a candidate tenant identifier against the shared pattern and
/// length bound (1..63).
fn validate(identifier: &str) -> CoreResult<()> {
    if identifier.is_empty() || identifier.len() > 63 || !IDENTIFIER_PATTERN.is_match(identifier) {
        return Err(CoreError::InvalidIdentifier(identifier.to_string()));
    }
    Ok(())
}

/// Extracts a tenant identifier from a request. An empty string means "no
/// tenant here, try the next resolver"; an error means the identifier
/// present was malformed and resolution should abort.
pub trait Resolver: Send + Sync {
    /// Resolve an identifier, or `""` if this resolver found nothing.
    fn resolve(&self, request: &Request) -> CoreResult<String>;
}

/// Resolves the leftmost label of the `Host` header, after stripping a
/// configured base suffix and any port.
pub struct SubdomainResolver {
    /// Suffix stripped from the host before splitting, e.g. `".app.com"`.
    pub base_suffix: String,
}

impl SubdomainResolver {
    /// Build a resolver that strips `base_suffix` from the host.
    pub fn new(base_suffix: impl Into<String>) -> Self {
        Self {
            base_suffix: base_suffix.into(),
        }
    }
}

impl Resolver for SubdomainResolver {
    fn resolve(&self, request: &Request) -> CoreResult<String> {
        let host = request.host.split(':').next().unwrap_or(&request.host);
        let stripped = host.strip_suffix(&self.base_suffix).unwrap_or(host);
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() < 3 {
            return Ok(String::new());
        }
        let candidate_labels: Vec<&str> = stripped.split('.').filter(|l| !l.is_empty()).collect();
        let leftmost = candidate_labels.iter().find(|l| **l != "www");
        let Some(identifier) = leftmost else {
            return Ok(String::new());
        };
        if identifier.is_empty() {
            return Ok(String::new());
        }
        validate(identifier)?;
        Ok(identifier.to_string())
    }
}

/// Resolves a named header (default `X-Tenant-ID`), trimmed.
pub struct HeaderResolver {
    /// Header name to read.
    pub header_name: String,
}

impl HeaderResolver {
    /// A resolver reading `X-Tenant-ID`.
    pub fn new() -> Self {
        Self {
            header_name: "X-Tenant-ID".to_string(),
        }
    }

    /// A resolver reading a custom header name.
    pub fn with_header(header_name: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
        }
    }
}

impl Default for HeaderResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for HeaderResolver {
    fn resolve(&self, request: &Request) -> CoreResult<String> {
        let Some(raw) = request.header(&self.header_name) else {
            return Ok(String::new());
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(String::new());
        }
        validate(trimmed)?;
        Ok(trimmed.to_string())
    }
}

/// Resolves a 1-based path segment.
pub struct PathResolver {
    /// 1-based index into the path's non-empty segments.
    pub position: usize,
}

impl PathResolver {
    /// Build a resolver reading the 1-based segment at `position`.
    pub fn new(position: usize) -> Self {
        Self { position }
    }
}

impl Resolver for PathResolver {
    fn resolve(&self, request: &Request) -> CoreResult<String> {
        let segments = request.path_segments();
        if self.position == 0 || self.position > segments.len() {
            return Ok(String::new());
        }
        let candidate = segments[self.position - 1];
        if candidate.is_empty() {
            return Ok(String::new());
        }
        validate(candidate)?;
        Ok(candidate.to_string())
    }
}

/// Tries each resolver in order; the first non-empty result wins.
/// Individual resolver errors are aggregated and surfaced only if every
/// resolver in the chain yields an empty identifier.
pub struct CompositeResolver {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl CompositeResolver {
    /// Build a chain tried in the given order.
    pub fn new(resolvers: Vec<Box<dyn Resolver>>) -> Self {
        Self { resolvers }
    }
}

impl Resolver for CompositeResolver {
    fn resolve(&self, request: &Request) -> CoreResult<String> {
        let mut errors = Vec::new();
        for resolver in &self.resolvers {
            match resolver.resolve(request) {
                Ok(identifier) if !identifier.is_empty() => return Ok(identifier),
                Ok(_) => continue,
                Err(err) => errors.push(err),
            }
        }
        if let Some(first) = errors.into_iter().next() {
            return Err(first);
        }
        Ok(String::new())
    }
}
