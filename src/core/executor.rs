//! Preconfigured executor variants.
//!
//! [`Executors`] hands out independent pools in the three shapes most callers
//! need: a single sequential worker, a fixed pool, and a scheduled pool. It
//! keeps nothing but construction parameters; every call returns a fresh
//! instance.

use std::sync::Arc;

use crate::config::{PoolConfig, PoolKind};

use super::{ExecutorError, LogSink, Scheduler, WorkerPool};

/// Default name given to single-worker pools.
pub const SINGLE_POOL_NAME: &str = "single-executor";
/// Default name given to fixed pools.
pub const FIXED_POOL_NAME: &str = "pool-executor";
/// Default name given to scheduled pools.
pub const SCHEDULED_POOL_NAME: &str = "schedule-executor";

/// Factory for the standard executor configurations.
///
/// Queues are unbounded in every variant.
///
/// # Example
///
/// ```rust,no_run
/// use prometheus_executor::core::{Executors, ShutdownMode};
///
/// let executors = Executors::new();
/// let single = executors.single_worker()?;
/// let result = single.submit(|| "Callable Result".to_string()).get()?;
/// assert_eq!(result, "Callable Result");
/// single.shutdown(ShutdownMode::Graceful);
/// # Ok::<(), prometheus_executor::core::ExecutorError>(())
/// ```
#[derive(Clone, Default)]
pub struct Executors {
    sink: Option<Arc<dyn LogSink>>,
    thread_stack_size: Option<usize>,
}

impl std::fmt::Debug for Executors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executors")
            .field("has_sink", &self.sink.is_some())
            .field("thread_stack_size", &self.thread_stack_size)
            .finish()
    }
}

impl Executors {
    /// Factory with no log sink and default thread stacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report lifecycle events of every executor built from now on to `sink`.
    #[must_use]
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = Some(thread_stack_size);
        self
    }

    /// One worker, unbounded queue: tasks run strictly in submission order.
    ///
    /// # Errors
    ///
    /// `ExecutorError::Internal` if the worker thread cannot be spawned.
    pub fn single_worker(&self) -> Result<WorkerPool, ExecutorError> {
        WorkerPool::build(self.config(SINGLE_POOL_NAME, PoolKind::Single, 1), self.sink.clone())
    }

    /// `workers` threads sharing one unbounded queue.
    ///
    /// # Errors
    ///
    /// `ExecutorError::InvalidConfig` if `workers` is zero,
    /// `ExecutorError::Internal` if a thread cannot be spawned.
    pub fn fixed_pool(&self, workers: usize) -> Result<WorkerPool, ExecutorError> {
        WorkerPool::build(
            self.config(FIXED_POOL_NAME, PoolKind::Fixed, workers),
            self.sink.clone(),
        )
    }

    /// `workers` threads behind a [`Scheduler`].
    ///
    /// # Errors
    ///
    /// Same as [`fixed_pool`](Self::fixed_pool).
    pub fn scheduled(&self, workers: usize) -> Result<Scheduler, ExecutorError> {
        Scheduler::build(
            self.config(SCHEDULED_POOL_NAME, PoolKind::Scheduled, workers),
            self.sink.clone(),
        )
    }

    fn config(&self, name: &str, kind: PoolKind, workers: usize) -> PoolConfig {
        let cfg = PoolConfig::new()
            .with_name(name)
            .with_kind(kind)
            .with_worker_count(workers)
            .with_queue_capacity(0);
        match self.thread_stack_size {
            Some(size) => cfg.with_thread_stack_size(size),
            None => cfg,
        }
    }
}
