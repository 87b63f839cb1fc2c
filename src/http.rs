//! Framework-agnostic request/response/middleware plumbing.
//!
//! Both the rate limiter's admission middleware and the tenant router's
//! resolution middleware are expressed against this narrow capability set
//! rather than against a specific web framework, mirroring how the teacher
//! crate keeps its own RPC middleware decoupled from any transport.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// An inbound HTTP-shaped request, as seen by admission/routing middleware.
///
/// Only the attributes the four subsystems actually resolve against are
/// modeled: host, path, method and headers. A request body is out of scope.
#[derive(Clone, Debug, Default)]
pub struct Request {
    /// `Host` header value, e.g. `"acme.app.com"`.
    pub host: String,
    /// Request path, e.g. `"/api/users"`.
    pub path: String,
    /// HTTP method, e.g. `"GET"`.
    pub method: String,
    /// Case-sensitive header map. Callers normalize casing as needed.
    pub headers: HashMap<String, String>,
}

impl Request {
    /// Build a request for a given host and path; method defaults to GET.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            method: "GET".to_string(),
            headers: HashMap::new(),
        }
    }

    /// Attach a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Look up a header by exact name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Path split into non-empty segments, e.g. `"/a/b/"` -> `["a", "b"]`.
    pub fn path_segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}

/// A response produced by a middleware chain.
#[derive(Clone, Debug, Default)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
}

impl Response {
    /// A bare 200 OK with no headers.
    pub fn ok() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
        }
    }

    /// A response with the given status and no headers.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
        }
    }

    /// Attach a header, returning self for chaining.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Result type returned by middleware and handlers in this module.
pub type HttpResult = Result<Response, Response>;

/// Request-scoped data threaded alongside a [`Request`] through a chain.
///
/// Generic over `Ctx` so callers can carry their own application state
/// (database handles, tenant slots, …) the same way the teacher's RPC
/// `Context<Ctx>` does.
#[derive(Clone)]
pub struct Context<Ctx> {
    /// Application-supplied state.
    pub state: Ctx,
    /// Cooperative cancellation for this request.
    pub cancellation: crate::context::RequestContext,
}

impl<Ctx: Clone> Context<Ctx> {
    /// Wrap application state in a fresh, non-cancelled context.
    pub fn new(state: Ctx) -> Self {
        Self {
            state,
            cancellation: crate::context::RequestContext::new(),
        }
    }
}

/// The remainder of the middleware chain.
pub type Next<Ctx> =
    Arc<dyn Fn(Context<Ctx>, Request) -> Pin<Box<dyn Future<Output = HttpResult> + Send>> + Send + Sync>;

/// A single middleware step.
pub type MiddlewareFn<Ctx> = Arc<
    dyn Fn(Context<Ctx>, Request, Next<Ctx>) -> Pin<Box<dyn Future<Output = HttpResult> + Send>>
        + Send
        + Sync,
>;

/// Build a [`MiddlewareFn`] from an async function or closure.
///
/// ```rust,ignore
/// let mw = from_fn(|ctx, req, next| async move { next(ctx, req).await });
/// ```
pub fn from_fn<Ctx, F, Fut>(f: F) -> MiddlewareFn<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
    F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HttpResult> + Send + 'static,
{
    Arc::new(move |ctx, req, next| Box::pin(f(ctx, req, next)))
}
