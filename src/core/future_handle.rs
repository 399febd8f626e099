//! Completion tokens returned to submitters, and the context handed to task
//! bodies.
//!
//! A [`FutureHandle`] and the worker that runs its task share one
//! [`Completion`]: a `parking_lot::Mutex` guarding the task state, paired with
//! a `Condvar` that wakes blocked readers. Every transition happens under the
//! mutex, so exactly one terminal transition ever succeeds.
//!
//! Cancellation is cooperative. Cancelling a pending task guarantees it never
//! runs; cancelling a running task only raises a flag that the body may
//! observe through [`TaskContext::is_cancelled`] or
//! [`TaskContext::checkpoint`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use uuid::Uuid;

use super::{ExecutorError, LogSink, TaskError};

/// Identity of a submitted task: the owning pool plus submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    /// Identifier of the pool the task was submitted to.
    pub pool: Uuid,
    /// Submission sequence number within that pool, starting at 0.
    pub seq: u64,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pool.simple(), self.seq)
    }
}

/// Observable lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Queued (or waiting for its fire time), not yet started.
    Pending,
    /// A worker is executing the body.
    Running,
    /// Finished with a value.
    Completed,
    /// Finished with an error, a panic, or was rejected at submission.
    Failed,
    /// Cancelled before it ran, or the body honoured a cancellation request.
    Cancelled,
}

impl TaskStatus {
    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Error a body returns (usually through `?` on
/// [`TaskContext::checkpoint`]) to acknowledge a cancellation request. The
/// task then ends as `Cancelled` rather than `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task interrupted by cancellation request")]
pub struct Interrupted;

enum TaskState<T> {
    Pending,
    Running,
    Completed(T),
    Failed(ExecutorError),
    Cancelled,
}

impl<T> TaskState<T> {
    const fn status(&self) -> TaskStatus {
        match self {
            Self::Pending => TaskStatus::Pending,
            Self::Running => TaskStatus::Running,
            Self::Completed(_) => TaskStatus::Completed,
            Self::Failed(_) => TaskStatus::Failed,
            Self::Cancelled => TaskStatus::Cancelled,
        }
    }

    fn outcome(&self) -> Option<Result<T, ExecutorError>>
    where
        T: Clone,
    {
        match self {
            Self::Pending | Self::Running => None,
            Self::Completed(value) => Some(Ok(value.clone())),
            Self::Failed(err) => Some(Err(err.clone())),
            Self::Cancelled => Some(Err(ExecutorError::Cancelled)),
        }
    }
}

/// Shared state between one writer (the worker) and any number of readers.
pub(crate) struct Completion<T> {
    id: TaskId,
    state: Mutex<TaskState<T>>,
    done: Condvar,
    cancel_requested: Arc<AtomicBool>,
}

impl<T> Completion<T> {
    pub(crate) fn new(id: TaskId) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Mutex::new(TaskState::Pending),
            done: Condvar::new(),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        })
    }

    pub(crate) const fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_requested)
    }

    pub(crate) fn status(&self) -> TaskStatus {
        self.state.lock().status()
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// `Pending -> Running`. Fails if the task was cancelled (or otherwise
    /// settled) while queued.
    pub(crate) fn try_start(&self) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, TaskState::Pending) {
            *state = TaskState::Running;
            true
        } else {
            false
        }
    }

    /// Move to a terminal state. `Err(Cancelled)` lands in `Cancelled`.
    /// Returns `false` if the task had already settled.
    pub(crate) fn finish(&self, outcome: Result<T, ExecutorError>) -> bool {
        let mut state = self.state.lock();
        if state.status().is_terminal() {
            return false;
        }
        *state = match outcome {
            Ok(value) => TaskState::Completed(value),
            Err(ExecutorError::Cancelled) => TaskState::Cancelled,
            Err(err) => TaskState::Failed(err),
        };
        self.done.notify_all();
        true
    }

    pub(crate) fn cancel(&self, may_interrupt: bool) -> bool {
        let mut state = self.state.lock();
        match *state {
            TaskState::Pending => {
                if may_interrupt {
                    self.cancel_requested.store(true, Ordering::Release);
                }
                *state = TaskState::Cancelled;
                self.done.notify_all();
                true
            }
            TaskState::Running => {
                if may_interrupt {
                    self.cancel_requested.store(true, Ordering::Release);
                }
                false
            }
            _ => false,
        }
    }

    fn wait(&self) -> Result<T, ExecutorError>
    where
        T: Clone,
    {
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = state.outcome() {
                return outcome;
            }
            self.done.wait(&mut state);
        }
    }

    fn wait_for(&self, timeout: Duration) -> Result<T, ExecutorError>
    where
        T: Clone,
    {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait();
        };
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = state.outcome() {
                return outcome;
            }
            if self.done.wait_until(&mut state, deadline).timed_out() {
                return state.outcome().unwrap_or(Err(ExecutorError::TimedOut));
            }
        }
    }

    fn try_outcome(&self) -> Option<Result<T, ExecutorError>>
    where
        T: Clone,
    {
        self.state.lock().outcome()
    }
}

/// Caller-visible completion token for a submitted task.
///
/// Clones observe the same task. Reads of a terminal state are idempotent:
/// every call to [`get`](Self::get) after completion returns the same value or
/// error.
pub struct FutureHandle<T> {
    inner: Arc<Completion<T>>,
}

impl<T> Clone for FutureHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for FutureHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureHandle")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}

impl<T> FutureHandle<T> {
    pub(crate) const fn from_completion(inner: Arc<Completion<T>>) -> Self {
        Self { inner }
    }

    /// Identity of the task behind this handle.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.inner.id()
    }

    /// Snapshot of the task's current state.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.inner.status()
    }

    /// Whether the task reached a terminal state (completed, failed or
    /// cancelled).
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.is_terminal()
    }

    /// Whether the task ended in the `Cancelled` state.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status() == TaskStatus::Cancelled
    }

    /// Whether a cooperative cancellation request was raised for the body.
    #[must_use]
    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Acquire)
    }

    /// Request cancellation.
    ///
    /// A pending task moves straight to `Cancelled` and will never run. A
    /// running task is not stopped; when `may_interrupt` is set its
    /// cancellation flag is raised for the body to observe. Returns `true`
    /// only if this call changed the task's state.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        let accepted = self.inner.cancel(may_interrupt);
        if accepted {
            tracing::debug!(task_id = %self.inner.id, "Task cancelled before running");
        }
        accepted
    }
}

impl<T: Clone> FutureHandle<T> {
    /// Block until the task settles and return its value.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::Cancelled` if the task was cancelled
    /// - `ExecutorError::TaskError` / `TaskPanic` if the body failed
    /// - `ExecutorError::QueueFull` / `PoolClosed` if submission was rejected
    pub fn get(&self) -> Result<T, ExecutorError> {
        self.inner.wait()
    }

    /// Like [`get`](Self::get), but gives up after `timeout`.
    ///
    /// The task keeps running after a timeout.
    ///
    /// # Errors
    ///
    /// `ExecutorError::TimedOut` if the task has not settled in time, or any
    /// error [`get`](Self::get) can return.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, ExecutorError> {
        self.inner.wait_for(timeout)
    }

    /// Non-blocking read: `None` while the task is pending or running.
    #[must_use]
    pub fn try_get(&self) -> Option<Result<T, ExecutorError>> {
        self.inner.try_outcome()
    }
}

#[cfg(feature = "tokio-runtime")]
impl<T: Clone + Send + 'static> FutureHandle<T> {
    /// Await the task from async code.
    ///
    /// The blocking wait is moved to tokio's blocking thread pool so the
    /// calling runtime is never stalled.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus `ExecutorError::Internal` if the
    /// blocking waiter could not be joined.
    pub async fn get_async(&self) -> Result<T, ExecutorError> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.get())
            .await
            .map_err(|e| ExecutorError::Internal(format!("blocking waiter failed: {e}")))?
    }
}

/// Context passed to every task body.
///
/// Gives the body its identity, the cooperative cancellation flag and access
/// to the pool's injected log sink.
#[derive(Clone)]
pub struct TaskContext {
    id: TaskId,
    pool_name: Arc<str>,
    cancel_requested: Arc<AtomicBool>,
    sink: Option<Arc<dyn LogSink>>,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("id", &self.id)
            .field("pool_name", &self.pool_name)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    pub(crate) const fn new(
        id: TaskId,
        pool_name: Arc<str>,
        cancel_requested: Arc<AtomicBool>,
        sink: Option<Arc<dyn LogSink>>,
    ) -> Self {
        Self {
            id,
            pool_name,
            cancel_requested,
            sink,
        }
    }

    /// Identity of the running task.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Name of the pool executing the task.
    #[must_use]
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// Return [`Interrupted`] if cancellation was requested.
    ///
    /// # Errors
    ///
    /// [`Interrupted`] once a cancellation request is observed.
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.is_cancelled() {
            Err(Interrupted.into())
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early if cancellation is requested.
    ///
    /// # Errors
    ///
    /// [`Interrupted`] if cancellation was requested before or during the
    /// sleep.
    pub fn sleep(&self, duration: Duration) -> Result<(), TaskError> {
        const SLICE: Duration = Duration::from_millis(10);
        // `None`: too far out to represent, sleep until cancelled.
        let deadline = Instant::now().checked_add(duration);
        loop {
            self.checkpoint()?;
            let step = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    (deadline - now).min(SLICE)
                }
                None => SLICE,
            };
            std::thread::sleep(step);
        }
    }

    /// Write a tagged message to the pool's log sink, or to `tracing` when
    /// no sink was injected.
    pub fn log(&self, tag: &str, message: &str) {
        match &self.sink {
            Some(sink) => sink.log(tag, message),
            None => tracing::debug!(tag = tag, task_id = %self.id, "{message}"),
        }
    }
}
