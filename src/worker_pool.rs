//! # Worker Pool Module
//!
//! A fixed pool of OS threads that runs blocking handlers off the coroutine
//! scheduler. The calling coroutine parks on a reply channel while the job runs,
//! so other coroutines keep being served by the scheduler's own threads.
//!
//! ## Configuration
//!
//! - `TRAMLINE_BLOCKING_WORKERS`: Number of worker threads (default: 4)
//! - `TRAMLINE_WORKER_STACK_SIZE`: Stack size for worker threads (default: 0x200000)

use crate::dispatcher::DispatchError;
use crate::runtime_config::{RuntimeConfig, DEFAULT_WORKER_STACK_SIZE};
use may::sync::mpsc;
use once_cell::sync::Lazy;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for a worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Number of worker threads
    pub num_workers: usize,
    /// Stack size for worker threads
    pub stack_size: usize,
}

impl WorkerPoolConfig {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from(&RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn new(num_workers: usize, stack_size: usize) -> Self {
        Self {
            num_workers,
            stack_size,
        }
    }
}

impl From<&RuntimeConfig> for WorkerPoolConfig {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            num_workers: config.blocking_workers,
            stack_size: config.worker_stack_size,
        }
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            stack_size: DEFAULT_WORKER_STACK_SIZE,
        }
    }
}

/// Metrics for a worker pool
#[derive(Debug, Default)]
pub struct WorkerPoolMetrics {
    /// Current queue depth (approximate)
    pub queue_depth: AtomicUsize,
    /// Total jobs dispatched
    pub dispatched_count: AtomicU64,
    /// Total jobs completed, panics included
    pub completed_count: AtomicU64,
}

impl WorkerPoolMetrics {
    pub fn record_dispatch(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get_queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }
}

/// A pool of threads consuming jobs from one shared queue.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    sender: mpsc::Sender<Job>,
    metrics: Arc<WorkerPoolMetrics>,
    name: String,
}

static BLOCKING_POOL: Lazy<WorkerPool> =
    Lazy::new(|| WorkerPool::new("blocking", WorkerPoolConfig::from_env()));

/// The process-wide pool used by blocking endpoints, created on first use.
#[must_use]
pub fn blocking_pool() -> &'static WorkerPool {
    &BLOCKING_POOL
}

impl WorkerPool {
    /// Spawn `config.num_workers` threads (at least one).
    ///
    /// Threads that fail to spawn are logged and skipped. If none spawn, the
    /// queue is closed and every [`WorkerPool::run`] returns
    /// [`DispatchError::WorkerPoolUnavailable`].
    #[must_use]
    pub fn new(name: &str, config: WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let metrics = Arc::new(WorkerPoolMetrics::default());
        let num_workers = config.num_workers.max(1);

        info!(
            pool = %name,
            num_workers = num_workers,
            stack_size = config.stack_size,
            "Creating worker pool"
        );

        for worker_id in 0..num_workers {
            let rx = Arc::clone(&rx);
            let metrics = Arc::clone(&metrics);
            let pool_name = name.to_string();

            let spawn_result = std::thread::Builder::new()
                .name(format!("tramline-{name}-{worker_id}"))
                .stack_size(config.stack_size)
                .spawn(move || {
                    debug!(pool = %pool_name, worker_id = worker_id, "Worker thread started");
                    loop {
                        // The guard is dropped before the job runs
                        let next = match rx.lock() {
                            Ok(guard) => guard.recv(),
                            Err(_) => break,
                        };
                        match next {
                            Ok(job) => {
                                job();
                                metrics.record_completion();
                            }
                            Err(_) => break,
                        }
                    }
                    debug!(pool = %pool_name, worker_id = worker_id, "Worker thread exiting");
                });

            if let Err(e) = spawn_result {
                error!(
                    pool = %name,
                    worker_id = worker_id,
                    error = %e,
                    "Failed to spawn worker thread"
                );
            }
        }

        Self {
            config,
            sender: tx,
            metrics,
            name: name.to_string(),
        }
    }

    /// Run `job` on a worker and wait for its result.
    ///
    /// Called from a coroutine, the wait suspends the coroutine. A panic inside
    /// `job` is caught on the worker and reported as
    /// [`DispatchError::HandlerPanicked`] naming `handler_name`.
    pub fn run<F, T>(&self, handler_name: &str, job: F) -> Result<T, DispatchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();
        let wrapped: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job));
            if reply_tx.send(outcome).is_err() {
                debug!("Blocking job finished after its caller went away");
            }
        });

        self.metrics.record_dispatch();
        if self.sender.send(wrapped).is_err() {
            error!(pool = %self.name, handler_name = %handler_name, "Worker pool queue closed");
            self.metrics.record_completion();
            return Err(DispatchError::WorkerPoolUnavailable);
        }

        match reply_rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(
                    pool = %self.name,
                    handler_name = %handler_name,
                    panic_message = %message,
                    "Handler panicked - CRITICAL"
                );
                Err(DispatchError::HandlerPanicked {
                    name: handler_name.to_string(),
                    message,
                })
            }
            Err(_) => Err(DispatchError::WorkerPoolUnavailable),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<WorkerPoolMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_worker_pool_config_default() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.num_workers, 4);
        assert_eq!(config.stack_size, 2 * 1024 * 1024);
    }

    #[test]
    fn test_worker_pool_config_from_runtime_config() {
        let runtime = RuntimeConfig::from_lookup(|name| match name {
            "TRAMLINE_WORKER_STACK_SIZE" => Some("0x100000".to_string()),
            "TRAMLINE_BLOCKING_WORKERS" => Some("2".to_string()),
            _ => None,
        });
        assert_eq!(WorkerPoolConfig::from(&runtime), WorkerPoolConfig::new(2, 0x10_0000));
    }

    #[test]
    fn test_run_returns_value_and_records_metrics() {
        let pool = WorkerPool::new("test", WorkerPoolConfig::new(2, DEFAULT_WORKER_STACK_SIZE));
        let value = pool.run("double", || 21 * 2).unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.metrics().get_dispatched_count(), 1);
        // completion is recorded by the worker after the reply is sent
        for _ in 0..100 {
            if pool.metrics().get_completed_count() == 1 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(pool.metrics().get_completed_count(), 1);
    }

    #[test]
    fn test_run_reports_panics() {
        let pool = WorkerPool::new("test", WorkerPoolConfig::new(1, DEFAULT_WORKER_STACK_SIZE));
        let err = pool
            .run("explode", || -> u32 { panic!("kaboom") })
            .unwrap_err();
        match err {
            DispatchError::HandlerPanicked { name, message } => {
                assert_eq!(name, "explode");
                assert_eq!(message, "kaboom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // the worker survives the panic
        assert_eq!(pool.run("after", || 1).unwrap(), 1);
    }
}
