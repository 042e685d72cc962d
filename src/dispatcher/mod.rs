//! # Dispatcher Module
//!
//! Endpoint invocation. Once a node has claimed a scope, the dispatcher runs
//! what it resolved to:
//!
//! - **handler** endpoints run inline on the dispatching coroutine and may
//!   suspend on `may` primitives,
//! - **blocking** endpoints run on the [`worker_pool`](crate::worker_pool) while
//!   the coroutine parks on a reply channel,
//! - **session** endpoints drive a socket session over the channel,
//! - **app** endpoints receive the scope and the channel directly.
//!
//! Handler failures are not translated into responses here; they surface as
//! [`DispatchError::Handler`] for an outer error translator.

mod core;
mod error;

pub use core::{App, Endpoint, HandlerFn, SessionFn};
pub use error::DispatchError;
