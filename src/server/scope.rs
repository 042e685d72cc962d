//! The inbound request descriptor and its per-level derivation.
//!
//! A [`Scope`] is never mutated while routing. Each nesting level that matches
//! derives a fresh copy with its contribution layered on top, so a scope seen by
//! an outer router is unaffected by what a nested router does with its own copy.

use super::response::HeaderVec;
use crate::dispatcher::Endpoint;
use crate::ids::RequestId;
use crate::router::{ChildScope, PathParams, Router};
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The kind of traffic a scope describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// A path-bearing request with a method
    Request,
    /// A long-lived bidirectional socket session
    Socket,
    /// The startup/shutdown handshake
    Lifecycle,
}

/// Request descriptor threaded through the routing tree.
#[derive(Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    /// Present for [`ScopeKind::Request`] only
    pub method: Option<Method>,
    pub scheme: String,
    /// Residual path, relative to `root_path`
    pub path: String,
    pub query_string: String,
    /// Path consumed by enclosing mounts
    pub root_path: String,
    /// Root path of the outermost application, captured by the first mount
    pub app_root_path: Option<String>,
    pub headers: HeaderVec,
    /// `host:port` of the server, used when no `host` header is present
    pub server: Option<String>,
    /// Parameters extracted so far, outermost first
    pub path_params: PathParams,
    /// Endpoint of the node that claimed this scope
    pub endpoint: Option<Endpoint>,
    /// Back-reference to the outermost router, for handler-side reverse lookups
    pub router: Option<Router>,
    pub request_id: RequestId,
    /// Set when running inside an application with its own error translation;
    /// routing failures are then returned as errors instead of emitted as responses
    pub bound: bool,
}

impl Scope {
    fn new(kind: ScopeKind, method: Option<Method>, path: &str) -> Self {
        Self {
            kind,
            method,
            scheme: match kind {
                ScopeKind::Socket => "ws".to_string(),
                _ => "http".to_string(),
            },
            path: path.to_string(),
            query_string: String::new(),
            root_path: String::new(),
            app_root_path: None,
            headers: HeaderVec::new(),
            server: None,
            path_params: PathParams::new(),
            endpoint: None,
            router: None,
            request_id: RequestId::new(),
            bound: false,
        }
    }

    #[must_use]
    pub fn request(method: Method, path: &str) -> Self {
        Self::new(ScopeKind::Request, Some(method), path)
    }

    #[must_use]
    pub fn socket(path: &str) -> Self {
        Self::new(ScopeKind::Socket, None, path)
    }

    #[must_use]
    pub fn lifecycle() -> Self {
        Self::new(ScopeKind::Lifecycle, None, "")
    }

    /// Append a header. An `x-request-id` header that parses as a ULID becomes
    /// the scope's request id.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case("x-request-id") {
            self.request_id = RequestId::from_header_or_new(Some(value));
        }
        self.headers.push((Arc::from(name.to_ascii_lowercase()), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_query(mut self, query_string: &str) -> Self {
        self.query_string = query_string.to_string();
        self
    }

    #[must_use]
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    #[must_use]
    pub fn with_root_path(mut self, root_path: &str) -> Self {
        self.root_path = root_path.to_string();
        self
    }

    #[must_use]
    pub fn with_server(mut self, server: &str) -> Self {
        self.server = Some(server.to_string());
        self
    }

    /// Mark the scope as running inside an application with its own error handling.
    #[must_use]
    pub fn bound(mut self) -> Self {
        self.bound = true;
        self
    }

    /// First header named `name` (case-insensitive).
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Hostname from the `host` header with any port stripped, or `""`.
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.header("host")
            .and_then(|h| h.split(':').next())
            .unwrap_or("")
    }

    /// A copy of this scope with the matched node's contribution layered on.
    #[must_use]
    pub fn derive(&self, child: ChildScope) -> Scope {
        let mut scope = self.clone();
        if let Some(params) = child.path_params {
            scope.path_params = params;
        }
        if let Some(endpoint) = child.endpoint {
            scope.endpoint = Some(endpoint);
        }
        if let Some(path) = child.path {
            scope.path = path;
        }
        if let Some(root_path) = child.root_path {
            scope.root_path = root_path;
        }
        if let Some(app_root_path) = child.app_root_path {
            scope.app_root_path = Some(app_root_path);
        }
        scope
    }

    /// A copy of this scope pointing at a different residual path.
    #[must_use]
    pub fn with_path(&self, path: &str) -> Scope {
        let mut scope = self.clone();
        scope.path = path.to_string();
        scope
    }

    /// A copy carrying a back-reference to `router`.
    #[must_use]
    pub fn with_router(mut self, router: Router) -> Scope {
        self.router = Some(router);
        self
    }

    fn authority(&self) -> &str {
        self.header("host")
            .or(self.server.as_deref())
            .unwrap_or("localhost")
    }

    /// The full URL this scope addresses: `scheme://host{root_path}{path}[?query]`.
    #[must_use]
    pub fn url(&self) -> String {
        let mut url = format!(
            "{}://{}{}{}",
            self.scheme,
            self.authority(),
            self.root_path,
            self.path
        );
        if !self.query_string.is_empty() {
            url.push('?');
            url.push_str(&self.query_string);
        }
        url
    }

    /// The base URL of the application: `scheme://host{app_root_path}/`.
    #[must_use]
    pub fn base_url(&self) -> String {
        let root = self.app_root_path.as_deref().unwrap_or(&self.root_path);
        format!(
            "{}://{}{}/",
            self.scheme,
            self.authority(),
            root.trim_end_matches('/')
        )
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("root_path", &self.root_path)
            .field("path_params", &self.path_params)
            .field("endpoint", &self.endpoint)
            .field("request_id", &self.request_id)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_strips_port() {
        let scope = Scope::request(Method::GET, "/").with_header("Host", "acme.example.com:8080");
        assert_eq!(scope.hostname(), "acme.example.com");
        assert_eq!(Scope::request(Method::GET, "/").hostname(), "");
    }

    #[test]
    fn test_url_includes_root_path_and_query() {
        let scope = Scope::request(Method::GET, "/items/")
            .with_header("host", "example.org")
            .with_root_path("/api")
            .with_query("page=2");
        assert_eq!(scope.url(), "http://example.org/api/items/?page=2");
    }

    #[test]
    fn test_derive_does_not_touch_parent() {
        let parent = Scope::request(Method::GET, "/api/items");
        let child = parent.derive(ChildScope {
            path: Some("/items".to_string()),
            root_path: Some("/api".to_string()),
            ..ChildScope::default()
        });
        assert_eq!(parent.path, "/api/items");
        assert_eq!(parent.root_path, "");
        assert_eq!(child.path, "/items");
        assert_eq!(child.root_path, "/api");
    }
}
