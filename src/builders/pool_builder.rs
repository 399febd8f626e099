//! Builders to construct named executors from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::{ExecutorSetConfig, PoolKind};
use crate::core::{ExecutorError, LogSink, Scheduler, ShutdownMode, WorkerPool};

/// An executor built from a [`PoolConfig`](crate::config::PoolConfig).
#[derive(Debug)]
pub enum ExecutorHandle {
    /// `single` or `fixed` pool.
    Pool(WorkerPool),
    /// `scheduled` pool.
    Scheduled(Scheduler),
}

impl ExecutorHandle {
    /// The worker pool behind either variant.
    #[must_use]
    pub const fn pool(&self) -> &WorkerPool {
        match self {
            Self::Pool(pool) => pool,
            Self::Scheduled(scheduler) => scheduler.pool(),
        }
    }

    /// The scheduler, if this executor is a scheduled one.
    #[must_use]
    pub const fn scheduler(&self) -> Option<&Scheduler> {
        match self {
            Self::Pool(_) => None,
            Self::Scheduled(scheduler) => Some(scheduler),
        }
    }

    /// Shut the executor down. See [`WorkerPool::shutdown`] and
    /// [`Scheduler::shutdown`].
    pub fn shutdown(&self, mode: ShutdownMode) -> usize {
        match self {
            Self::Pool(pool) => pool.shutdown(mode),
            Self::Scheduled(scheduler) => scheduler.shutdown(mode),
        }
    }

    /// Whether the executor has been shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        match self {
            Self::Pool(pool) => pool.is_shutdown(),
            Self::Scheduled(scheduler) => scheduler.is_shutdown(),
        }
    }
}

/// Build every executor described by `cfg`, keyed by pool name.
///
/// # Errors
///
/// `ExecutorError::InvalidConfig` if the configuration does not validate;
/// any construction error from [`WorkerPool`] or [`Scheduler`]. Executors
/// built before a failure are shut down.
pub fn build_executors(
    cfg: &ExecutorSetConfig,
    sink: Option<Arc<dyn LogSink>>,
) -> Result<HashMap<String, ExecutorHandle>, ExecutorError> {
    cfg.validate()
        .map_err(|e| ExecutorError::InvalidConfig(format!("config invalid: {e}")))?;

    let mut executors = HashMap::with_capacity(cfg.pools.len());
    for (name, pool_cfg) in &cfg.pools {
        let pool_cfg = pool_cfg.clone().with_name(name.as_str());
        let built = match pool_cfg.kind {
            PoolKind::Single | PoolKind::Fixed => {
                WorkerPool::build(pool_cfg, sink.clone()).map(ExecutorHandle::Pool)
            }
            PoolKind::Scheduled => {
                Scheduler::build(pool_cfg, sink.clone()).map(ExecutorHandle::Scheduled)
            }
        };
        match built {
            Ok(executor) => {
                executors.insert(name.clone(), executor);
            }
            Err(e) => {
                for executor in executors.values() {
                    executor.shutdown(ShutdownMode::Immediate);
                }
                return Err(e);
            }
        }
    }

    info!(count = executors.len(), "Executors built from configuration");
    Ok(executors)
}
