//! Lifespan node - startup/shutdown handshake over the channel.
//!
//! ```text
//! CREATED --lifecycle.start--> STARTING --all ok--> RUNNING --lifecycle.stop--> STOPPING --> STOPPED
//!                                  |
//!                                  +--handler failed--> FAILED
//! ```
//!
//! Startup aborts on the first failing handler. Shutdown runs every handler
//! even when some fail, always emits `lifecycle.stop.complete`, and reports the
//! failures afterwards.

use super::node::{ChildScope, Match};
use crate::dispatcher::DispatchError;
use crate::server::{Channel, Message, Scope, ScopeKind};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// A zero-argument startup or shutdown handler.
pub type LifecycleFn = dyn Fn() -> anyhow::Result<()> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifespanState {
    Created = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
    Failed = 5,
}

impl LifespanState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LifespanState::Starting,
            2 => LifespanState::Running,
            3 => LifespanState::Stopping,
            4 => LifespanState::Stopped,
            5 => LifespanState::Failed,
            _ => LifespanState::Created,
        }
    }
}

impl fmt::Display for LifespanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifespanState::Created => "created",
            LifespanState::Starting => "starting",
            LifespanState::Running => "running",
            LifespanState::Stopping => "stopping",
            LifespanState::Stopped => "stopped",
            LifespanState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Owns the startup and shutdown handler sequences.
///
/// Clones share handlers and state, so the state observed through a clone held
/// by the caller follows the handshake run by the router.
#[derive(Clone, Default)]
pub struct Lifespan {
    startup: Vec<Arc<LifecycleFn>>,
    shutdown: Vec<Arc<LifecycleFn>>,
    state: Arc<AtomicU8>,
}

impl Lifespan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a startup handler. Handlers run in registration order.
    #[must_use]
    pub fn on_startup<F>(mut self, handler: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.startup.push(Arc::new(handler));
        self
    }

    /// Register a shutdown handler. Handlers run in registration order.
    #[must_use]
    pub fn on_shutdown<F>(mut self, handler: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shutdown.push(Arc::new(handler));
        self
    }

    pub(crate) fn push_startup(&mut self, handler: Arc<LifecycleFn>) {
        self.startup.push(handler);
    }

    pub(crate) fn push_shutdown(&mut self, handler: Arc<LifecycleFn>) {
        self.shutdown.push(handler);
    }

    #[must_use]
    pub fn state(&self) -> LifespanState {
        LifespanState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, to: LifespanState) {
        let from = self.state();
        self.state.store(to as u8, Ordering::Release);
        info!(from = %from, to = %to, "Lifespan state transition");
    }

    pub fn matches(&self, scope: &Scope) -> (Match, ChildScope) {
        if scope.kind == ScopeKind::Lifecycle {
            (Match::Full, ChildScope::default())
        } else {
            (Match::None, ChildScope::default())
        }
    }

    /// Run the full handshake on `channel`.
    ///
    /// Returns once `lifecycle.stop.complete` has been sent, or as soon as
    /// startup fails.
    pub fn handle(&self, _scope: Scope, channel: &mut dyn Channel) -> Result<(), DispatchError> {
        expect(channel, Message::LifecycleStart)?;
        self.startup(channel)?;
        expect(channel, Message::LifecycleStop)?;
        self.shutdown(channel)
    }

    /// `STARTING`: run startup handlers until the first failure.
    pub fn startup(&self, channel: &mut dyn Channel) -> Result<(), DispatchError> {
        self.transition(LifespanState::Starting);
        let started = Instant::now();

        for (index, handler) in self.startup.iter().enumerate() {
            if let Err(e) = handler() {
                let detail = format!("{e:#}");
                error!(handler_index = index, error = %e, "Startup handler failed");
                self.transition(LifespanState::Failed);
                channel.send(Message::LifecycleStartFailed {
                    detail: detail.clone(),
                })?;
                return Err(DispatchError::StartupFailed { detail });
            }
        }

        self.transition(LifespanState::Running);
        info!(
            handlers = self.startup.len(),
            duration_us = started.elapsed().as_micros() as u64,
            "Startup complete"
        );
        channel.send(Message::LifecycleStartComplete)?;
        Ok(())
    }

    /// `STOPPING`: run every shutdown handler, then report failures if any.
    pub fn shutdown(&self, channel: &mut dyn Channel) -> Result<(), DispatchError> {
        self.transition(LifespanState::Stopping);

        let mut failures = Vec::new();
        for (index, handler) in self.shutdown.iter().enumerate() {
            if let Err(e) = handler() {
                error!(handler_index = index, error = %e, "Shutdown handler failed");
                failures.push(format!("{e:#}"));
            }
        }

        self.transition(LifespanState::Stopped);
        channel.send(Message::LifecycleStopComplete)?;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::ShutdownFailed { failures })
        }
    }

    #[must_use]
    pub fn startup_len(&self) -> usize {
        self.startup.len()
    }

    #[must_use]
    pub fn shutdown_len(&self) -> usize {
        self.shutdown.len()
    }
}

fn expect(channel: &mut dyn Channel, expected: Message) -> Result<(), DispatchError> {
    let got = channel.receive()?;
    if got == expected {
        Ok(())
    } else {
        Err(DispatchError::Protocol {
            expected: expected.kind(),
            got: got.kind().to_string(),
        })
    }
}

fn same_handlers(a: &[Arc<LifecycleFn>], b: &[Arc<LifecycleFn>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

impl PartialEq for Lifespan {
    fn eq(&self, other: &Self) -> bool {
        same_handlers(&self.startup, &other.startup) && same_handlers(&self.shutdown, &other.shutdown)
    }
}

impl fmt::Debug for Lifespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifespan")
            .field("startup", &self.startup.len())
            .field("shutdown", &self.shutdown.len())
            .field("state", &self.state())
            .finish()
    }
}
