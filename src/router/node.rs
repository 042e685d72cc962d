//! Matchable nodes: leaf routes, mounted subtrees, host-gated subtrees and the
//! lifespan node.
//!
//! Every node answers the same three questions:
//!
//! - [`Node::matches`] - does this scope belong to me, and what do I add to it?
//! - [`Node::handle`] - dispatch a scope I fully (or partially) matched,
//! - [`Node::url_path_for`] - rebuild a concrete URL from a name and parameters.

use super::error::{NoMatchFound, RouteError};
use super::lifespan::Lifespan;
use super::params::PathParams;
use super::path::CompiledPath;
use super::url::{Protocol, UrlPath};
use super::Router;
use crate::converter::{ConverterRegistry, ParamValue};
use crate::dispatcher::{DispatchError, Endpoint};
use crate::server::{Channel, Response, Scope, ScopeKind};
use http::Method;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Outcome of testing a node against a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Match {
    /// Irrelevant to this node
    None,
    /// Recognized but not serviceable (e.g. method not allowed)
    Partial,
    /// The node is authoritative
    Full,
}

/// What a matching node contributes to the scope it is dispatched with.
#[derive(Debug, Clone, Default)]
pub struct ChildScope {
    pub path_params: Option<PathParams>,
    pub endpoint: Option<Endpoint>,
    pub path: Option<String>,
    pub root_path: Option<String>,
    pub app_root_path: Option<String>,
}

/// Parameter name a mount captures its residual path into.
const REST_PARAM: &str = "path";

fn no_match() -> (Match, ChildScope) {
    (Match::None, ChildScope::default())
}

/// Match `subject` against `compiled`, logging (and rejecting) captures that
/// fit the pattern but fail to decode.
fn capture(compiled: &CompiledPath, subject: &str) -> Option<PathParams> {
    match compiled.match_params(subject)? {
        Ok(params) => Some(params),
        Err(e) => {
            warn!(
                template = %compiled.template(),
                subject = %subject,
                error = %e,
                "Capture matched pattern but failed to decode"
            );
            None
        }
    }
}

/// Every placeholder of `compiled` except `skip` has a value in `params`.
fn covers(compiled: &CompiledPath, params: &PathParams, skip: &str) -> bool {
    compiled
        .param_names()
        .filter(|n| *n != skip)
        .all(|n| params.contains(n))
}

/// Resolve the name a subtree delegates to its children.
///
/// Unnamed subtrees pass `name` through; named ones require `<own>:<child>`.
fn residual_name<'a>(own: Option<&str>, name: &'a str) -> Option<&'a str> {
    match own {
        None => Some(name),
        Some(own) => name.strip_prefix(own).and_then(|r| r.strip_prefix(':')),
    }
}

/// A leaf route bound to one endpoint.
#[derive(Debug, Clone)]
pub struct Route {
    path: String,
    compiled: CompiledPath,
    endpoint: Endpoint,
    name: String,
    methods: Option<BTreeSet<String>>,
    protocol: Protocol,
    include_in_schema: bool,
}

impl Route {
    /// A request route. Plain handler endpoints default to `GET` and `HEAD`;
    /// app endpoints accept any method until [`Route::methods`] says otherwise.
    pub fn new(path: &str, endpoint: Endpoint) -> Result<Self, RouteError> {
        Self::compile(path, endpoint, Protocol::Http, ConverterRegistry::global())
    }

    /// A socket route. Socket routes have no method gating.
    pub fn socket(path: &str, endpoint: Endpoint) -> Result<Self, RouteError> {
        Self::compile(path, endpoint, Protocol::Socket, ConverterRegistry::global())
    }

    /// General constructor resolving converters in `registry`.
    pub fn compile(
        path: &str,
        endpoint: Endpoint,
        protocol: Protocol,
        registry: &ConverterRegistry,
    ) -> Result<Self, RouteError> {
        if !path.starts_with('/') {
            return Err(RouteError::InvalidTemplate {
                template: path.to_string(),
                reason: "routed paths must start with '/'".to_string(),
            });
        }
        let compiled = CompiledPath::compile_with(path, registry)?;
        let methods = (protocol == Protocol::Http && endpoint.is_function())
            .then(|| ["GET", "HEAD"].iter().map(|m| (*m).to_string()).collect());
        Ok(Self {
            path: path.to_string(),
            compiled,
            name: endpoint.name().to_string(),
            endpoint,
            methods,
            protocol,
            include_in_schema: true,
        })
    }

    /// Restrict the route to `methods` (case-insensitive). `GET` implies `HEAD`.
    pub fn methods<I, S>(mut self, methods: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for method in methods {
            let upper = method.as_ref().to_ascii_uppercase();
            Method::from_bytes(upper.as_bytes())
                .map_err(|_| RouteError::InvalidMethod(method.as_ref().to_string()))?;
            set.insert(upper);
        }
        if set.contains("GET") {
            set.insert("HEAD".to_string());
        }
        self.methods = Some(set);
        Ok(self)
    }

    /// Accept every method.
    #[must_use]
    pub fn any_method(mut self) -> Self {
        self.methods = None;
        self
    }

    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    #[must_use]
    pub fn include_in_schema(mut self, include: bool) -> Self {
        self.include_in_schema = include;
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    #[must_use]
    pub fn allowed_methods(&self) -> Option<&BTreeSet<String>> {
        self.methods.as_ref()
    }

    #[must_use]
    pub fn is_in_schema(&self) -> bool {
        self.include_in_schema
    }

    #[must_use]
    pub fn compiled(&self) -> &CompiledPath {
        &self.compiled
    }

    fn allows(&self, method: Option<&Method>) -> bool {
        match (&self.methods, method) {
            (None, _) => true,
            (Some(set), Some(m)) => set.iter().any(|s| s.eq_ignore_ascii_case(m.as_str())),
            (Some(_), None) => false,
        }
    }

    fn serves(&self, kind: ScopeKind) -> bool {
        matches!(
            (self.protocol, kind),
            (Protocol::Http, ScopeKind::Request) | (Protocol::Socket, ScopeKind::Socket)
        )
    }

    pub fn matches(&self, scope: &Scope) -> (Match, ChildScope) {
        if !self.serves(scope.kind) {
            return no_match();
        }
        let Some(matched) = capture(&self.compiled, &scope.path) else {
            return no_match();
        };
        let mut params = scope.path_params.clone();
        params.merge(&matched);
        let child = ChildScope {
            path_params: Some(params),
            endpoint: Some(self.endpoint.clone()),
            ..ChildScope::default()
        };
        if self.protocol == Protocol::Http && !self.allows(scope.method.as_ref()) {
            (Match::Partial, child)
        } else {
            (Match::Full, child)
        }
    }

    pub fn handle(&self, scope: Scope, channel: &mut dyn Channel) -> Result<(), DispatchError> {
        if self.protocol == Protocol::Http && !self.allows(scope.method.as_ref()) {
            let method = scope
                .method
                .as_ref()
                .map_or_else(String::new, |m| m.to_string());
            debug!(
                request_id = %scope.request_id,
                route_name = %self.name,
                method = %method,
                path = %scope.path,
                "Method not allowed"
            );
            if scope.bound {
                return Err(DispatchError::MethodNotAllowed {
                    method,
                    path: scope.path,
                });
            }
            let mut response = Response::text(405, "Method Not Allowed");
            if let Some(methods) = &self.methods {
                let allow: Vec<&str> = methods.iter().map(String::as_str).collect();
                response.set_header("allow", allow.join(", "));
            }
            response.send(channel)?;
            return Ok(());
        }
        self.endpoint.call(scope, channel)
    }

    pub fn url_path_for(&self, name: &str, params: &PathParams) -> Result<UrlPath, NoMatchFound> {
        let expected = self.compiled.param_names().count();
        if name != self.name || params.len() != expected || !covers(&self.compiled, params, "") {
            return Err(NoMatchFound::new(name));
        }
        let (path, remaining) = self.compiled.replace_params(params).map_err(|e| {
            debug!(route_name = %self.name, error = %e, "Parameter rejected by converter");
            NoMatchFound::new(name)
        })?;
        debug_assert!(remaining.is_empty());
        Ok(UrlPath::new(path).with_protocol(Some(self.protocol)))
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.name == other.name
            && self.endpoint == other.endpoint
            && self.methods == other.methods
            && self.protocol == other.protocol
    }
}

/// A subtree mounted under a path prefix.
#[derive(Debug, Clone)]
pub struct Mount {
    path: String,
    compiled: CompiledPath,
    target: Endpoint,
    name: Option<String>,
}

impl Mount {
    /// Mount a nested router built from `routes`.
    pub fn new(path: &str, routes: Vec<Node>) -> Result<Self, RouteError> {
        Self::app(path, Endpoint::app(Router::from_nodes(routes)))
    }

    /// Mount an existing endpoint (a shared router, a channel app, a handler).
    pub fn app(path: &str, target: Endpoint) -> Result<Self, RouteError> {
        Self::compile(path, target, ConverterRegistry::global())
    }

    pub fn compile(
        path: &str,
        target: Endpoint,
        registry: &ConverterRegistry,
    ) -> Result<Self, RouteError> {
        if !(path.is_empty() || path.starts_with('/')) {
            return Err(RouteError::InvalidTemplate {
                template: path.to_string(),
                reason: "routed paths must start with '/'".to_string(),
            });
        }
        let path = path.trim_end_matches('/');
        let compiled = CompiledPath::compile_with(&format!("{path}/{{{REST_PARAM}:path}}"), registry)?;
        Ok(Self {
            path: path.to_string(),
            compiled,
            target,
            name: None,
        })
    }

    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// The prefix, without a trailing slash.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The prefix with converter annotations stripped: `/org/{id:int}` -> `/org/{id}`.
    #[must_use]
    pub fn prefix_format(&self) -> &str {
        let format = self.compiled.format();
        format.strip_suffix("/{path}").unwrap_or(format)
    }

    #[must_use]
    pub fn target(&self) -> &Endpoint {
        &self.target
    }

    /// Nested nodes, or `None` when the target is opaque.
    #[must_use]
    pub fn routes(&self) -> Option<&[Node]> {
        self.target.routes()
    }

    pub fn matches(&self, scope: &Scope) -> (Match, ChildScope) {
        if !matches!(scope.kind, ScopeKind::Request | ScopeKind::Socket) {
            return no_match();
        }
        let Some(mut matched) = capture(&self.compiled, &scope.path) else {
            return no_match();
        };
        let rest = matched
            .remove(REST_PARAM)
            .map(|v| v.to_string())
            .unwrap_or_default();
        let remaining_path = format!("/{rest}");
        let consumed = scope.path.len().saturating_sub(remaining_path.len());
        let matched_path = scope.path.get(..consumed).unwrap_or("");

        let mut params = scope.path_params.clone();
        params.merge(&matched);

        let child = ChildScope {
            path_params: Some(params),
            endpoint: Some(self.target.clone()),
            path: Some(remaining_path),
            root_path: Some(format!("{}{}", scope.root_path, matched_path)),
            app_root_path: Some(
                scope
                    .app_root_path
                    .clone()
                    .unwrap_or_else(|| scope.root_path.clone()),
            ),
        };
        (Match::Full, child)
    }

    pub fn handle(&self, scope: Scope, channel: &mut dyn Channel) -> Result<(), DispatchError> {
        self.target.call(scope, channel)
    }

    pub fn url_path_for(&self, name: &str, params: &PathParams) -> Result<UrlPath, NoMatchFound> {
        if self.name.as_deref() == Some(name) && params.contains(REST_PARAM) {
            // The mount as a whole: the literal `path` is appended verbatim
            let mut params = params.clone();
            if let Some(rest) = params.get(REST_PARAM).map(ParamValue::to_string) {
                params.insert(REST_PARAM, rest.trim_start_matches('/').to_string());
            }
            let (path, remaining) = self
                .compiled
                .replace_params(&params)
                .map_err(|_| NoMatchFound::new(name))?;
            if remaining.is_empty() && covers(&self.compiled, &params, REST_PARAM) {
                return Ok(UrlPath::new(path));
            }
            return Err(NoMatchFound::new(name));
        }

        let Some(residual) = residual_name(self.name.as_deref(), name) else {
            return Err(NoMatchFound::new(name));
        };
        if !covers(&self.compiled, params, REST_PARAM) {
            return Err(NoMatchFound::new(name));
        }
        let (prefix, mut remaining) = self
            .compiled
            .replace_params_with_blank(params, REST_PARAM)
            .map_err(|_| NoMatchFound::new(name))?;
        if let Some(rest) = params.get(REST_PARAM) {
            remaining.insert(REST_PARAM, rest.clone());
        }
        let prefix = prefix.trim_end_matches('/');

        for node in self.routes().unwrap_or_default() {
            if let Ok(url) = node.url_path_for(residual, &remaining) {
                return Ok(UrlPath {
                    path: format!("{prefix}{}", url.path),
                    protocol: url.protocol,
                    host: url.host,
                });
            }
        }
        Err(NoMatchFound::new(name))
    }
}

impl PartialEq for Mount {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.name == other.name && self.target == other.target
    }
}

/// A subtree selected by the request's `host` header.
#[derive(Debug, Clone)]
pub struct Host {
    host: String,
    compiled: CompiledPath,
    target: Endpoint,
    name: Option<String>,
}

impl Host {
    /// Gate a nested router built from `routes` on `host`.
    pub fn new(host: &str, routes: Vec<Node>) -> Result<Self, RouteError> {
        Self::app(host, Endpoint::app(Router::from_nodes(routes)))
    }

    /// Gate an existing endpoint on `host`.
    pub fn app(host: &str, target: Endpoint) -> Result<Self, RouteError> {
        Self::compile(host, target, ConverterRegistry::global())
    }

    pub fn compile(
        host: &str,
        target: Endpoint,
        registry: &ConverterRegistry,
    ) -> Result<Self, RouteError> {
        Ok(Self {
            host: host.to_string(),
            compiled: CompiledPath::compile_with(host, registry)?,
            target,
            name: None,
        })
    }

    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn target(&self) -> &Endpoint {
        &self.target
    }

    #[must_use]
    pub fn routes(&self) -> Option<&[Node]> {
        self.target.routes()
    }

    pub fn matches(&self, scope: &Scope) -> (Match, ChildScope) {
        if !matches!(scope.kind, ScopeKind::Request | ScopeKind::Socket) {
            return no_match();
        }
        let Some(matched) = capture(&self.compiled, scope.hostname()) else {
            return no_match();
        };
        let mut params = scope.path_params.clone();
        params.merge(&matched);
        let child = ChildScope {
            path_params: Some(params),
            endpoint: Some(self.target.clone()),
            ..ChildScope::default()
        };
        (Match::Full, child)
    }

    pub fn handle(&self, scope: Scope, channel: &mut dyn Channel) -> Result<(), DispatchError> {
        self.target.call(scope, channel)
    }

    pub fn url_path_for(&self, name: &str, params: &PathParams) -> Result<UrlPath, NoMatchFound> {
        if self.name.as_deref() == Some(name) && params.contains(REST_PARAM) {
            let mut params = params.clone();
            let path = params
                .remove(REST_PARAM)
                .map(|v| v.to_string())
                .unwrap_or_default();
            let (host, remaining) = self
                .compiled
                .replace_params(&params)
                .map_err(|_| NoMatchFound::new(name))?;
            if remaining.is_empty() && covers(&self.compiled, &params, "") {
                return Ok(UrlPath::new(path).with_host(Some(host)));
            }
            return Err(NoMatchFound::new(name));
        }

        let Some(residual) = residual_name(self.name.as_deref(), name) else {
            return Err(NoMatchFound::new(name));
        };
        if !covers(&self.compiled, params, "") {
            return Err(NoMatchFound::new(name));
        }
        let (host, remaining) = self
            .compiled
            .replace_params(params)
            .map_err(|_| NoMatchFound::new(name))?;

        for node in self.routes().unwrap_or_default() {
            if let Ok(url) = node.url_path_for(residual, &remaining) {
                return Ok(UrlPath {
                    path: url.path,
                    protocol: url.protocol,
                    host: Some(host),
                });
            }
        }
        Err(NoMatchFound::new(name))
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.name == other.name && self.target == other.target
    }
}

/// A node in a router's ordered list.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Route(Route),
    Mount(Mount),
    Host(Host),
    Lifespan(Lifespan),
}

impl Node {
    pub fn matches(&self, scope: &Scope) -> (Match, ChildScope) {
        match self {
            Node::Route(r) => r.matches(scope),
            Node::Mount(m) => m.matches(scope),
            Node::Host(h) => h.matches(scope),
            Node::Lifespan(l) => l.matches(scope),
        }
    }

    pub fn handle(&self, scope: Scope, channel: &mut dyn Channel) -> Result<(), DispatchError> {
        match self {
            Node::Route(r) => r.handle(scope, channel),
            Node::Mount(m) => m.handle(scope, channel),
            Node::Host(h) => h.handle(scope, channel),
            Node::Lifespan(l) => l.handle(scope, channel),
        }
    }

    pub fn url_path_for(&self, name: &str, params: &PathParams) -> Result<UrlPath, NoMatchFound> {
        match self {
            Node::Route(r) => r.url_path_for(name, params),
            Node::Mount(m) => m.url_path_for(name, params),
            Node::Host(h) => h.url_path_for(name, params),
            Node::Lifespan(_) => Err(NoMatchFound::new(name)),
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Route(r) => Some(r.name()),
            Node::Mount(m) => m.name(),
            Node::Host(h) => h.name(),
            Node::Lifespan(_) => None,
        }
    }

    #[must_use]
    pub fn routes(&self) -> Option<&[Node]> {
        match self {
            Node::Mount(m) => m.routes(),
            Node::Host(h) => h.routes(),
            Node::Route(_) | Node::Lifespan(_) => None,
        }
    }
}

impl From<Route> for Node {
    fn from(route: Route) -> Self {
        Node::Route(route)
    }
}

impl From<Mount> for Node {
    fn from(mount: Mount) -> Self {
        Node::Mount(mount)
    }
}

impl From<Host> for Node {
    fn from(host: Host) -> Self {
        Node::Host(host)
    }
}

impl From<Lifespan> for Node {
    fn from(lifespan: Lifespan) -> Self {
        Node::Lifespan(lifespan)
    }
}
