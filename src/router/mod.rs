//! # Router Module
//!
//! Path-based dispatch over a tree of matchable nodes, with the reverse
//! direction (name + parameters to URL) resolved over the same tree.
//!
//! ## Overview
//!
//! A [`Router`] holds an ordered list of [`Node`]s:
//!
//! - [`Route`] - a leaf binding a path template (and, for requests, a method
//!   set) to an [`Endpoint`](crate::dispatcher::Endpoint),
//! - [`Mount`] - a subtree reached through a path prefix,
//! - [`Host`] - a subtree selected by the `host` header,
//! - [`Lifespan`] - the startup/shutdown handshake.
//!
//! ## Architecture
//!
//! 1. **Registration**: templates like `/users/{id:int}` compile once into an
//!    anchored regex, a substitution format and per-parameter converters
//!    ([`CompiledPath`]). Unknown converter types fail here, not at request time.
//!
//! 2. **Matching**: each node reports [`Match::None`], [`Match::Partial`] or
//!    [`Match::Full`] together with its [`ChildScope`] contribution. The first
//!    full match is dispatched; otherwise the first partial one (which is how a
//!    known path with the wrong method becomes a 405 instead of a 404).
//!
//! 3. **Reverse lookup**: [`Router::url_path_for`] asks each node in turn.
//!    Mounts and hosts qualify child names as `mount:child`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tramline::dispatcher::Endpoint;
//! use tramline::router::{PathParams, Router};
//!
//! let router = Router::builder()
//!     .route("/users/{id:int}", Endpoint::handler(get_user))?
//!     .build();
//!
//! let url = router.url_path_for("get_user", &PathParams::new().with("id", 42))?;
//! assert_eq!(url.path, "/users/42");
//! ```

mod core;
mod error;
mod lifespan;
mod node;
mod params;
mod path;
mod url;
#[cfg(test)]
mod tests;

pub use core::{EndpointInfo, Router, RouterBuilder};
pub use error::{NoMatchFound, RouteError};
pub use lifespan::{LifecycleFn, Lifespan, LifespanState};
pub use node::{ChildScope, Host, Match, Mount, Node, Route};
pub use params::{ParamVec, PathParams, MAX_INLINE_PARAMS};
pub use path::CompiledPath;
pub use url::{Protocol, UrlPath};
