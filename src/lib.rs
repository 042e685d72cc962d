//! # tramline
//!
//! **tramline** is a path-based request router with typed path parameters,
//! nested mounts, host gating, reverse URL lookup and a startup/shutdown
//! handshake, built on the `may` coroutine runtime.
//!
//! ## Overview
//!
//! Routes are declared once, at startup, through [`router::RouterBuilder`].
//! Each template (`/users/{id:int}`) compiles into an anchored regex, a
//! substitution format and typed [`converter`]s. Incoming requests are
//! described by a [`server::Scope`] and answered over a [`server::Channel`];
//! the router walks its nodes in registration order and dispatches to the
//! first one that claims the scope.
//!
//! ## Architecture
//!
//! - **[`converter`]** - Path parameter codecs and the converter registry
//! - **[`router`]** - Path compiler, nodes (route, mount, host, lifespan), dispatch and reverse lookup
//! - **[`dispatcher`]** - Endpoint invocation: inline handlers, blocking handlers, socket sessions, apps
//! - **[`server`]** - Scope, channel, messages, request/response/session types
//! - **[`worker_pool`]** - Thread pool that keeps blocking handlers off the coroutine scheduler
//! - **[`table`]** - Declarative YAML route tables wired to echo endpoints
//! - **[`cli`]** - Command-line front end over route tables
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Transport
//!     participant Router
//!     participant Mount as Mount / Host
//!     participant Nested as Nested Router
//!     participant Endpoint
//!
//!     Transport->>Router: dispatch(scope, channel)
//!     Router->>Router: attach back-reference
//!     loop nodes in registration order
//!         Router->>Mount: matches(scope)
//!         Mount-->>Router: FULL + child scope (path, root_path, params)
//!     end
//!     Router->>Mount: handle(derived scope)
//!     Mount->>Nested: dispatch(derived scope)
//!     Nested->>Endpoint: call(scope, channel)
//!     Endpoint-->>Transport: response.start / response.body
//!
//!     alt nothing matched, toggled slash matches
//!         Router-->>Transport: 307 redirect
//!     else nothing matched
//!         Router-->>Transport: 404 Not Found / socket.close
//!     end
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use http::Method;
//! use tramline::dispatcher::Endpoint;
//! use tramline::router::{Mount, Route, Router};
//! use tramline::server::{MemoryChannel, Request, Response, Scope};
//!
//! fn list_items(_req: Request) -> anyhow::Result<Response> {
//!     Ok(Response::text(200, "items"))
//! }
//!
//! let router = Router::builder()
//!     .node(Mount::new("/api", vec![Route::new("/items", Endpoint::handler(list_items))?.into()])?.named("api"))
//!     .build();
//!
//! let (mut app, mut transport) = MemoryChannel::pair();
//! router.dispatch(Scope::request(Method::GET, "/api/items"), &mut app)?;
//! assert_eq!(router.url_path_for("api:list_items", &Default::default())?.path, "/api/items");
//! ```
//!
//! ## Configuration
//!
//! Runtime settings come from the environment, see [`runtime_config`] and
//! [`logging`].

pub mod cli;
pub mod converter;
pub mod dispatcher;
pub mod echo;
pub mod ids;
pub mod logging;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod table;
pub mod worker_pool;

pub use dispatcher::{App, DispatchError, Endpoint};
pub use router::{Host, Mount, NoMatchFound, PathParams, Route, RouteError, Router, RouterBuilder};
pub use server::{Channel, MemoryChannel, Message, Request, Response, Scope};
