#![allow(clippy::unwrap_used)]

use super::{ChildScope, Host, Match, Mount, Node, PathParams, Protocol, Route, RouteError, Router};
use crate::converter::{ConversionError, Converter, ConverterRegistry, ParamValue};
use crate::dispatcher::{App, DispatchError, Endpoint};
use crate::server::{Channel, Request, Response, Scope};
use http::Method;
use std::sync::Arc;

fn ok(_req: Request) -> anyhow::Result<Response> {
    Ok(Response::text(200, "ok"))
}

struct Opaque;

impl App for Opaque {
    fn call(&self, _scope: Scope, _channel: &mut dyn Channel) -> Result<(), DispatchError> {
        Ok(())
    }
}

fn child_of(node: &Node, scope: &Scope) -> (Match, ChildScope) {
    node.matches(scope)
}

#[test]
fn test_route_full_match_extracts_typed_params() {
    let route: Node = Route::new("/users/{id:int}", Endpoint::handler(ok)).unwrap().into();
    let (matched, child) = child_of(&route, &Scope::request(Method::GET, "/users/42"));
    assert_eq!(matched, Match::Full);
    let params = child.path_params.unwrap();
    assert_eq!(params.get("id"), Some(&ParamValue::Int(42)));
    assert!(child.endpoint.is_some());
    assert!(child.path.is_none());
}

#[test]
fn test_route_wrong_method_is_partial() {
    let route = Route::new("/items", Endpoint::handler(ok))
        .unwrap()
        .methods(["post"])
        .unwrap();
    let (matched, _) = route.matches(&Scope::request(Method::GET, "/items"));
    assert_eq!(matched, Match::Partial);
    let (matched, _) = route.matches(&Scope::request(Method::POST, "/items"));
    assert_eq!(matched, Match::Full);
}

#[test]
fn test_route_pattern_mismatch_is_none() {
    let route = Route::new("/users/{id:int}", Endpoint::handler(ok)).unwrap();
    assert_eq!(route.matches(&Scope::request(Method::GET, "/users/abc")).0, Match::None);
    assert_eq!(route.matches(&Scope::request(Method::GET, "/users/1/x")).0, Match::None);
}

#[test]
fn test_function_endpoints_default_to_get_and_head() {
    let route = Route::new("/", Endpoint::handler(ok)).unwrap();
    let methods: Vec<&str> = route
        .allowed_methods()
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(methods, vec!["GET", "HEAD"]);
    assert_eq!(route.matches(&Scope::request(Method::HEAD, "/")).0, Match::Full);
}

#[test]
fn test_app_endpoints_accept_any_method() {
    let route = Route::new("/hook", Endpoint::app(Opaque)).unwrap();
    assert!(route.allowed_methods().is_none());
    assert_eq!(route.matches(&Scope::request(Method::DELETE, "/hook")).0, Match::Full);
}

#[test]
fn test_get_implies_head() {
    let route = Route::new("/", Endpoint::handler(ok))
        .unwrap()
        .methods(["get", "Post"])
        .unwrap();
    let methods: Vec<&str> = route
        .allowed_methods()
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(methods, vec!["GET", "HEAD", "POST"]);
}

#[test]
fn test_invalid_method_is_rejected() {
    let err = Route::new("/", Endpoint::handler(ok))
        .unwrap()
        .methods(["GE T"])
        .unwrap_err();
    assert!(matches!(err, RouteError::InvalidMethod(m) if m == "GE T"));
}

#[test]
fn test_route_path_must_start_with_slash() {
    let err = Route::new("users", Endpoint::handler(ok)).unwrap_err();
    assert!(matches!(err, RouteError::InvalidTemplate { .. }));
}

#[test]
fn test_unknown_converter_fails_registration() {
    let err = Route::new("/users/{id:bogus}", Endpoint::handler(ok)).unwrap_err();
    assert!(matches!(err, RouteError::UnknownConverter { converter, .. } if converter == "bogus"));
}

#[test]
fn test_socket_route_ignores_requests() {
    let route = Route::socket("/ws", Endpoint::app(Opaque)).unwrap();
    assert_eq!(route.protocol(), Protocol::Socket);
    assert_eq!(route.matches(&Scope::request(Method::GET, "/ws")).0, Match::None);
    assert_eq!(route.matches(&Scope::socket("/ws")).0, Match::Full);
}

#[test]
fn test_mount_splits_residual_path() {
    let mount = Mount::new("/api", vec![Route::new("/items", Endpoint::handler(ok)).unwrap().into()])
        .unwrap();
    let (matched, child) = mount.matches(&Scope::request(Method::GET, "/api/items"));
    assert_eq!(matched, Match::Full);
    assert_eq!(child.path.as_deref(), Some("/items"));
    assert_eq!(child.root_path.as_deref(), Some("/api"));
    assert_eq!(child.app_root_path.as_deref(), Some(""));
    // the residual path is not a parameter
    assert!(child.path_params.unwrap().is_empty());
}

#[test]
fn test_mount_accumulates_root_path() {
    let mount = Mount::app("/v1/", Endpoint::app(Opaque)).unwrap();
    assert_eq!(mount.path(), "/v1");
    let scope = Scope::request(Method::GET, "/v1/items/").with_root_path("/api");
    let (_, child) = mount.matches(&scope);
    assert_eq!(child.path.as_deref(), Some("/items/"));
    assert_eq!(child.root_path.as_deref(), Some("/api/v1"));
    assert_eq!(child.app_root_path.as_deref(), Some("/api"));
}

#[test]
fn test_mount_prefix_params_are_merged() {
    let mount = Mount::app("/org/{org}", Endpoint::app(Opaque)).unwrap();
    let scope = Scope::request(Method::GET, "/org/acme/users");
    let (matched, child) = mount.matches(&scope);
    assert_eq!(matched, Match::Full);
    let params = child.path_params.unwrap();
    assert_eq!(params.get("org"), Some(&ParamValue::from("acme")));
    assert_eq!(child.path.as_deref(), Some("/users"));
}

#[test]
fn test_mount_requires_separator_after_prefix() {
    let mount = Mount::app("/api", Endpoint::app(Opaque)).unwrap();
    assert_eq!(mount.matches(&Scope::request(Method::GET, "/api")).0, Match::None);
    assert_eq!(mount.matches(&Scope::request(Method::GET, "/apix")).0, Match::None);
    assert_eq!(mount.matches(&Scope::lifecycle()).0, Match::None);
}

#[test]
fn test_host_ignores_port_and_keeps_path() {
    let host = Host::app("{tenant}.example.com", Endpoint::app(Opaque)).unwrap();
    let scope = Scope::request(Method::GET, "/dashboard").with_header("Host", "acme.example.com:8080");
    let (matched, child) = host.matches(&scope);
    assert_eq!(matched, Match::Full);
    assert_eq!(
        child.path_params.unwrap().get("tenant"),
        Some(&ParamValue::from("acme"))
    );
    assert!(child.path.is_none());
}

#[test]
fn test_host_without_header_is_none() {
    let host = Host::app("{tenant}.example.com", Endpoint::app(Opaque)).unwrap();
    assert_eq!(host.matches(&Scope::request(Method::GET, "/")).0, Match::None);
}

#[test]
fn test_route_reverse_requires_exact_params() {
    let route = Route::new("/users/{id:int}", Endpoint::handler(ok))
        .unwrap()
        .named("user");
    let params = PathParams::new().with("id", 7i64);
    assert_eq!(route.url_path_for("user", &params).unwrap().path, "/users/7");
    assert!(route.url_path_for("user", &PathParams::new()).is_err());
    assert!(route
        .url_path_for("user", &params.clone().with("extra", "x"))
        .is_err());
    assert!(route.url_path_for("other", &params).is_err());
}

#[test]
fn test_route_reverse_rejects_unencodable_value() {
    let route = Route::new("/users/{id:int}", Endpoint::handler(ok)).unwrap();
    let params = PathParams::new().with("id", -1i64);
    assert!(route.url_path_for("ok", &params).is_err());
}

#[test]
fn test_equality_uses_template_name_and_endpoint() {
    let endpoint = Endpoint::handler(ok);
    let a = Route::new("/a", endpoint.clone()).unwrap();
    let b = Route::new("/a", endpoint.clone()).unwrap();
    let c = Route::new("/a", endpoint).unwrap().named("c");
    assert_eq!(a, b);
    assert_ne!(a, c);

    let shared = Router::from_nodes(vec![a.into()]);
    let m1 = Mount::app("/x", Endpoint::app(shared.clone())).unwrap();
    let m2 = m1.clone();
    let m3 = Mount::app("/x", Endpoint::app(shared)).unwrap();
    assert_eq!(m1, m2);
    // distinct endpoint instances
    assert_ne!(m1, m3);
}

struct Slug;

impl Converter for Slug {
    fn pattern(&self) -> &str {
        "[a-z0-9-]+"
    }

    fn decode(&self, raw: &str) -> Result<ParamValue, ConversionError> {
        Ok(ParamValue::Str(raw.to_string()))
    }

    fn encode(&self, value: &ParamValue) -> Result<String, ConversionError> {
        Ok(value.to_string())
    }
}

#[test]
fn test_endpoints_under_mount_with_custom_converter() {
    let mut registry = ConverterRegistry::default();
    registry.register("slug", Arc::new(Slug));

    let inner = Router::from_nodes(vec![Route::new("/items", Endpoint::handler(ok))
        .unwrap()
        .into()]);
    let mount = Mount::compile("/org/{org:slug}", Endpoint::app(inner.clone()), &registry).unwrap();
    assert_eq!(mount.prefix_format(), "/org/{org}");

    let router = Router::builder()
        .converters(registry)
        .mount("/org/{org:slug}", inner)
        .unwrap()
        .build();
    let endpoints = router.endpoints();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].path, "/org/{org}/items");
    assert_eq!(endpoints[0].method, "GET");
}
