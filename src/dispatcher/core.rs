//! Dispatcher core module - invoking the endpoint a node resolved to.

use super::error::DispatchError;
use crate::router::Node;
use crate::server::{Channel, Request, Response, Scope, Session};
use crate::worker_pool::blocking_pool;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A request handler: `(request) -> response`.
pub type HandlerFn = dyn Fn(Request) -> anyhow::Result<Response> + Send + Sync;

/// A socket session handler.
pub type SessionFn = dyn for<'a> Fn(Session<'a>) -> anyhow::Result<()> + Send + Sync;

/// A full channel handler.
///
/// Receives the scope and the channel and owns the exchange from there on.
/// [`Router`](crate::router::Router) is itself an `App`, which is how mounted
/// and host-gated subtrees are dispatched.
pub trait App: Send + Sync {
    fn call(&self, scope: Scope, channel: &mut dyn Channel) -> Result<(), DispatchError>;

    /// Nodes this application routes over, if it exposes any.
    ///
    /// Reverse lookup and schema enumeration recurse through these.
    fn routes(&self) -> Option<&[Node]> {
        None
    }
}

#[derive(Clone)]
enum Target {
    /// Runs inline on the dispatching coroutine
    Handler(Arc<HandlerFn>),
    /// Runs on the blocking worker pool
    Blocking(Arc<HandlerFn>),
    Session(Arc<SessionFn>),
    App(Arc<dyn App>),
}

/// Something a route can dispatch to, with the name it is known by.
#[derive(Clone)]
pub struct Endpoint {
    name: Arc<str>,
    target: Target,
}

/// Last path segment of a Rust type name, generics dropped.
///
/// For `fn` items this is the function identifier.
fn type_identifier<T: ?Sized>() -> Arc<str> {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    Arc::from(base.rsplit("::").next().unwrap_or(base))
}

impl Endpoint {
    /// A handler that may suspend cooperatively; runs on the dispatching coroutine.
    pub fn handler<F>(func: F) -> Self
    where
        F: Fn(Request) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        Self {
            name: type_identifier::<F>(),
            target: Target::Handler(Arc::new(func)),
        }
    }

    /// A handler that blocks its thread; runs on the worker pool.
    pub fn blocking<F>(func: F) -> Self
    where
        F: Fn(Request) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        Self {
            name: type_identifier::<F>(),
            target: Target::Blocking(Arc::new(func)),
        }
    }

    /// A socket session handler.
    pub fn session<F>(func: F) -> Self
    where
        F: for<'a> Fn(Session<'a>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: type_identifier::<F>(),
            target: Target::Session(Arc::new(func)),
        }
    }

    /// A full channel handler.
    pub fn app<A: App + 'static>(app: A) -> Self {
        Self {
            name: type_identifier::<A>(),
            target: Target::App(Arc::new(app)),
        }
    }

    /// A full channel handler shared with other owners.
    #[must_use]
    pub fn shared(app: Arc<dyn App>) -> Self {
        Self {
            name: Arc::from("App"),
            target: Target::App(app),
        }
    }

    /// Override the inferred name.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = Arc::from(name);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a plain `(request) -> response` function.
    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self.target, Target::Handler(_) | Target::Blocking(_))
    }

    /// Nodes exposed by an [`App`] endpoint.
    #[must_use]
    pub fn routes(&self) -> Option<&[Node]> {
        match &self.target {
            Target::App(app) => app.routes(),
            _ => None,
        }
    }

    fn target_ptr(&self) -> *const () {
        match &self.target {
            Target::Handler(f) | Target::Blocking(f) => Arc::as_ptr(f) as *const (),
            Target::Session(f) => Arc::as_ptr(f) as *const (),
            Target::App(a) => Arc::as_ptr(a) as *const (),
        }
    }

    /// Run the endpoint against a matched scope.
    pub fn call(&self, scope: Scope, channel: &mut dyn Channel) -> Result<(), DispatchError> {
        let request_id = scope.request_id;
        let started = Instant::now();

        debug!(
            request_id = %request_id,
            handler_name = %self.name,
            path_params = ?scope.path_params,
            "Handler execution start"
        );

        match &self.target {
            Target::Handler(func) => {
                let response = func(Request::new(scope)).map_err(|source| self.failed(source))?;
                response.send(channel)?;
            }
            Target::Blocking(func) => {
                let func = Arc::clone(func);
                let request = Request::new(scope);
                let response = blocking_pool()
                    .run(&self.name, move || func(request))?
                    .map_err(|source| self.failed(source))?;
                response.send(channel)?;
            }
            Target::Session(func) => {
                func(Session::new(scope, channel)).map_err(|source| self.failed(source))?;
            }
            Target::App(app) => return app.call(scope, channel),
        }

        info!(
            request_id = %request_id,
            handler_name = %self.name,
            execution_time_ms = started.elapsed().as_millis() as u64,
            "Handler execution complete"
        );
        Ok(())
    }

    fn failed(&self, source: anyhow::Error) -> DispatchError {
        DispatchError::Handler {
            name: self.name.to_string(),
            source,
        }
    }
}

/// Endpoints compare by identity: same name, same underlying function or app.
impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && std::ptr::eq(self.target_ptr(), other.target_ptr())
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.target {
            Target::Handler(_) => "handler",
            Target::Blocking(_) => "blocking",
            Target::Session(_) => "session",
            Target::App(_) => "app",
        };
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}
