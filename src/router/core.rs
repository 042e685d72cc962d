//! Router core module - dispatch over an ordered node list.
//!
//! Matching is a linear scan in registration order. The first `FULL` match
//! wins; the first `PARTIAL` match is remembered and used only when nothing
//! later matches fully. Registration happens once, through [`RouterBuilder`];
//! a built [`Router`] is immutable and cheap to clone.

use super::error::{NoMatchFound, RouteError};
use super::lifespan::{Lifespan, LifecycleFn};
use super::node::{ChildScope, Host, Match, Mount, Node, Route};
use super::params::PathParams;
use super::url::{Protocol, UrlPath};
use crate::converter::ConverterRegistry;
use crate::dispatcher::{App, DispatchError, Endpoint};
use crate::runtime_config::RuntimeConfig;
use crate::server::{Channel, Message, Response, Scope, ScopeKind};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Matching slower than this is logged at warn level.
const SLOW_MATCH_US: u128 = 1000;

struct RouterInner {
    nodes: Vec<Node>,
    redirect_slashes: bool,
    default: Option<Endpoint>,
    lifespan: Lifespan,
}

/// An ordered list of nodes with a trailing-slash policy, a default handler
/// and a lifespan node.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

/// One documented operation, as listed by [`Router::endpoints`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointInfo {
    /// Full path template with converter annotations stripped
    pub path: String,
    pub method: String,
    pub name: String,
}

impl Router {
    #[must_use]
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// A router over `nodes` with default settings.
    #[must_use]
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let mut builder = RouterBuilder::new();
        builder.nodes = nodes;
        builder.build()
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.inner.nodes
    }

    #[must_use]
    pub fn redirect_slashes(&self) -> bool {
        self.inner.redirect_slashes
    }

    #[must_use]
    pub fn lifespan(&self) -> &Lifespan {
        &self.inner.lifespan
    }

    /// Route `scope` and run whatever it resolves to.
    pub fn dispatch(&self, scope: Scope, channel: &mut dyn Channel) -> Result<(), DispatchError> {
        let started = Instant::now();
        let mut scope = scope;
        if scope.router.is_none() {
            scope.router = Some(self.clone());
        }

        debug!(
            request_id = %scope.request_id,
            kind = ?scope.kind,
            method = ?scope.method,
            path = %scope.path,
            root_path = %scope.root_path,
            nodes = self.inner.nodes.len(),
            "Route match attempt"
        );

        let mut partial: Option<(&Node, ChildScope)> = None;
        for node in &self.inner.nodes {
            let (matched, child) = node.matches(&scope);
            match matched {
                Match::Full => {
                    let child_scope = scope.derive(child);
                    log_match_duration(&scope, node, started);
                    return node.handle(child_scope, channel);
                }
                Match::Partial if partial.is_none() => partial = Some((node, child)),
                Match::Partial | Match::None => {}
            }
        }

        if let Some((node, child)) = partial {
            info!(
                request_id = %scope.request_id,
                method = ?scope.method,
                path = %scope.path,
                route_name = ?node.name(),
                "Dispatching partial match"
            );
            let child_scope = scope.derive(child);
            return node.handle(child_scope, channel);
        }

        if scope.kind == ScopeKind::Request && self.inner.redirect_slashes && scope.path != "/" {
            let toggled = if scope.path.ends_with('/') {
                scope.path.trim_end_matches('/').to_string()
            } else {
                format!("{}/", scope.path)
            };
            let candidate = scope.with_path(&toggled);
            if self
                .inner
                .nodes
                .iter()
                .any(|node| node.matches(&candidate).0 != Match::None)
            {
                let location = candidate.url();
                info!(
                    request_id = %scope.request_id,
                    path = %scope.path,
                    location = %location,
                    "Redirecting to toggled trailing slash"
                );
                Response::redirect(&location).send(channel)?;
                return Ok(());
            }
        }

        if scope.kind == ScopeKind::Lifecycle {
            return self.inner.lifespan.handle(scope, channel);
        }

        warn!(
            request_id = %scope.request_id,
            method = ?scope.method,
            path = %scope.path,
            duration_us = started.elapsed().as_micros() as u64,
            "No route matched"
        );
        match &self.inner.default {
            Some(endpoint) => endpoint.call(scope, channel),
            None => not_found(scope, channel),
        }
    }

    /// Reverse lookup: the first node that resolves `name` with exactly `params`.
    pub fn url_path_for(&self, name: &str, params: &PathParams) -> Result<UrlPath, NoMatchFound> {
        self.inner
            .nodes
            .iter()
            .find_map(|node| node.url_path_for(name, params).ok())
            .ok_or_else(|| NoMatchFound::new(name))
    }

    /// Every request route marked for inclusion in the schema, mounted
    /// subtrees included, one entry per method (`HEAD` omitted).
    #[must_use]
    pub fn endpoints(&self) -> Vec<EndpointInfo> {
        let mut out = Vec::new();
        collect_endpoints(&self.inner.nodes, "", &mut out);
        out
    }
}

fn log_match_duration(scope: &Scope, node: &Node, started: Instant) {
    let elapsed = started.elapsed().as_micros();
    if elapsed > SLOW_MATCH_US {
        warn!(
            request_id = %scope.request_id,
            path = %scope.path,
            route_name = ?node.name(),
            duration_us = elapsed as u64,
            "Slow route match"
        );
    } else {
        debug!(
            request_id = %scope.request_id,
            path = %scope.path,
            route_name = ?node.name(),
            duration_us = elapsed as u64,
            "Route matched"
        );
    }
}

fn not_found(scope: Scope, channel: &mut dyn Channel) -> Result<(), DispatchError> {
    match scope.kind {
        ScopeKind::Socket => {
            channel.send(Message::SocketClose { code: 1000 })?;
            Ok(())
        }
        _ if scope.bound => Err(DispatchError::NotFound { path: scope.path }),
        _ => {
            Response::text(404, "Not Found").send(channel)?;
            Ok(())
        }
    }
}

fn collect_endpoints(nodes: &[Node], prefix: &str, out: &mut Vec<EndpointInfo>) {
    for node in nodes {
        match node {
            Node::Route(route) => {
                if route.protocol() != Protocol::Http || !route.is_in_schema() {
                    continue;
                }
                let Some(methods) = route.allowed_methods() else {
                    continue;
                };
                for method in methods.iter().filter(|m| m.as_str() != "HEAD") {
                    out.push(EndpointInfo {
                        path: format!("{prefix}{}", route.compiled().format()),
                        method: method.clone(),
                        name: route.name().to_string(),
                    });
                }
            }
            Node::Mount(mount) => {
                if let Some(children) = mount.routes() {
                    let nested = format!("{prefix}{}", mount.prefix_format());
                    collect_endpoints(children, &nested, out);
                }
            }
            Node::Host(host) => {
                if let Some(children) = host.routes() {
                    collect_endpoints(children, prefix, out);
                }
            }
            Node::Lifespan(_) => {}
        }
    }
}

impl App for Router {
    fn call(&self, scope: Scope, channel: &mut dyn Channel) -> Result<(), DispatchError> {
        self.dispatch(scope, channel)
    }

    fn routes(&self) -> Option<&[Node]> {
        Some(&self.inner.nodes)
    }
}

impl PartialEq for Router {
    fn eq(&self, other: &Self) -> bool {
        self.inner.nodes == other.inner.nodes
            && self.inner.redirect_slashes == other.inner.redirect_slashes
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("nodes", &self.inner.nodes)
            .field("redirect_slashes", &self.inner.redirect_slashes)
            .field("default", &self.inner.default)
            .field("lifespan", &self.inner.lifespan)
            .finish()
    }
}

/// Registration-phase builder for [`Router`].
///
/// Every `route`/`mount`/`host` call compiles its template immediately, so a
/// bad template fails the build instead of the first request.
pub struct RouterBuilder {
    nodes: Vec<Node>,
    redirect_slashes: bool,
    default: Option<Endpoint>,
    lifespan: Lifespan,
    converters: Option<ConverterRegistry>,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            redirect_slashes: true,
            default: None,
            lifespan: Lifespan::new(),
            converters: None,
        }
    }

    /// A builder with the trailing-slash policy taken from `config`.
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new().redirect_slashes(config.redirect_slashes)
    }

    /// Resolve converter types in `registry` instead of the built-in set.
    #[must_use]
    pub fn converters(mut self, registry: ConverterRegistry) -> Self {
        self.converters = Some(registry);
        self
    }

    fn registry(&self) -> &ConverterRegistry {
        self.converters
            .as_ref()
            .unwrap_or(ConverterRegistry::global())
    }

    /// Add a request route with default methods.
    pub fn route(self, path: &str, endpoint: Endpoint) -> Result<Self, RouteError> {
        let route = Route::compile(path, endpoint, Protocol::Http, self.registry())?;
        Ok(self.node(route))
    }

    /// Add a request route restricted to `methods`.
    pub fn route_with_methods(
        self,
        path: &str,
        endpoint: Endpoint,
        methods: &[&str],
    ) -> Result<Self, RouteError> {
        let route =
            Route::compile(path, endpoint, Protocol::Http, self.registry())?.methods(methods)?;
        Ok(self.node(route))
    }

    pub fn socket_route(self, path: &str, endpoint: Endpoint) -> Result<Self, RouteError> {
        let route = Route::compile(path, endpoint, Protocol::Socket, self.registry())?;
        Ok(self.node(route))
    }

    /// Mount `router` under `path`.
    pub fn mount(self, path: &str, router: Router) -> Result<Self, RouteError> {
        self.mount_app(path, Endpoint::app(router))
    }

    /// Mount an arbitrary endpoint under `path`.
    pub fn mount_app(self, path: &str, endpoint: Endpoint) -> Result<Self, RouteError> {
        let mount = Mount::compile(path, endpoint, self.registry())?;
        Ok(self.node(mount))
    }

    /// Gate `router` on a host template.
    pub fn host(self, host: &str, router: Router) -> Result<Self, RouteError> {
        let host = Host::compile(host, Endpoint::app(router), self.registry())?;
        Ok(self.node(host))
    }

    /// Append a prebuilt node.
    #[must_use]
    pub fn node(mut self, node: impl Into<Node>) -> Self {
        self.nodes.push(node.into());
        self
    }

    #[must_use]
    pub fn redirect_slashes(mut self, enabled: bool) -> Self {
        self.redirect_slashes = enabled;
        self
    }

    /// Handler for scopes no node matched. Defaults to a 404 / socket close.
    #[must_use]
    pub fn default_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.default = Some(endpoint);
        self
    }

    #[must_use]
    pub fn on_startup<F>(mut self, handler: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Arc<LifecycleFn> = Arc::new(handler);
        self.lifespan.push_startup(handler);
        self
    }

    #[must_use]
    pub fn on_shutdown<F>(mut self, handler: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Arc<LifecycleFn> = Arc::new(handler);
        self.lifespan.push_shutdown(handler);
        self
    }

    /// Replace the lifespan node wholesale.
    #[must_use]
    pub fn lifespan(mut self, lifespan: Lifespan) -> Self {
        self.lifespan = lifespan;
        self
    }

    #[must_use]
    pub fn build(self) -> Router {
        info!(
            nodes = self.nodes.len(),
            redirect_slashes = self.redirect_slashes,
            startup_handlers = self.lifespan.startup_len(),
            shutdown_handlers = self.lifespan.shutdown_len(),
            "Routing table built"
        );
        Router {
            inner: Arc::new(RouterInner {
                nodes: self.nodes,
                redirect_slashes: self.redirect_slashes,
                default: self.default,
                lifespan: self.lifespan,
            }),
        }
    }
}
