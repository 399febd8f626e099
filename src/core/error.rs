//! Error types for executor operations.

use thiserror::Error;

/// Errors produced by pools, schedulers and future handles.
///
/// The type is `Clone` so a failed task can be observed any number of times
/// through its [`FutureHandle`](crate::core::FutureHandle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// A bounded task queue rejected the task because it is at capacity.
    #[error("task queue is full")]
    QueueFull,
    /// The pool (or scheduler) has been shut down and accepts no more work.
    #[error("pool has been shut down")]
    PoolClosed,
    /// The task body panicked; carries the panic message.
    #[error("task panicked: {0}")]
    TaskPanic(String),
    /// The task body returned an error; carries the rendered error chain.
    #[error("task failed: {0}")]
    TaskError(String),
    /// The task was cancelled before or while running.
    #[error("task was cancelled")]
    Cancelled,
    /// A bounded wait expired before the task reached a terminal state.
    #[error("operation timed out")]
    TimedOut,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal failure (worker thread could not be spawned, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error type returned by fallible task bodies.
pub type TaskError = anyhow::Error;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
