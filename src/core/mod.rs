//! Core execution abstractions: queue, workers, futures and scheduling.

pub mod error;
pub mod executor;
pub mod future_handle;
pub mod log_sink;
pub mod scheduler;
mod task;
pub mod task_queue;
pub mod worker_pool;

pub use error::{AppResult, ExecutorError, TaskError};
pub use executor::{Executors, FIXED_POOL_NAME, SCHEDULED_POOL_NAME, SINGLE_POOL_NAME};
pub use future_handle::{FutureHandle, Interrupted, TaskContext, TaskId, TaskStatus};
pub use log_sink::{InMemoryLogSink, LogRecord, LogSink, TracingLogSink};
pub use scheduler::Scheduler;
pub use task::BodyResult;
pub use task_queue::{Rejected, TaskQueue};
pub use worker_pool::{PoolStats, ShutdownMode, WorkerPool};
