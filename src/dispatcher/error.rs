use crate::server::ChannelError;
use thiserror::Error;

/// Failure while dispatching a scope.
///
/// Routing itself only produces `MethodNotAllowed` and `NotFound`, and only
/// when the scope is bound to an application that translates them. The other
/// variants carry failures from handlers, the channel or the lifecycle.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("no route for {path}")]
    NotFound { path: String },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The handler returned an error; translation to a response is up to the caller
    #[error("handler '{name}' failed: {source:#}")]
    Handler {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("handler '{name}' panicked: {message}")]
    HandlerPanicked { name: String, message: String },

    #[error("blocking worker pool is not accepting work")]
    WorkerPoolUnavailable,

    #[error("startup failed: {detail}")]
    StartupFailed { detail: String },

    #[error("{} shutdown handler(s) failed: {}", failures.len(), failures.join("; "))]
    ShutdownFailed { failures: Vec<String> },

    /// The peer sent a message the lifecycle handshake does not allow here
    #[error("expected '{expected}' message, got '{got}'")]
    Protocol { expected: &'static str, got: String },
}
