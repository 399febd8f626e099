//! Type-erased units of work travelling through the task queue.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::future_handle::{Completion, Interrupted, TaskContext, TaskId};
use super::{ExecutorError, TaskError};

/// How a job ended, for pool accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Completed,
    Failed,
    Cancelled,
    /// Settled before a worker reached it; the body never ran.
    Skipped,
}

/// A queued unit of work, erased over its result type.
pub(crate) trait Job: Send {
    fn id(&self) -> TaskId;

    /// Flag a running body observes for cooperative cancellation.
    fn cancel_flag(&self) -> Arc<AtomicBool>;

    /// Whether the job's handle already settled (e.g. cancelled while
    /// queued).
    fn is_settled(&self) -> bool;

    /// Execute the body on the current thread and publish the outcome.
    fn run(self: Box<Self>) -> JobOutcome;

    /// Settle as `Cancelled` without running. Returns `true` if this changed
    /// the handle's state.
    fn abandon(self: Box<Self>) -> bool;

    /// Settle as failed because the job could not be queued.
    fn reject(self: Box<Self>, reason: ExecutorError);
}

/// Result returned by fallible, context-aware task bodies.
pub type BodyResult<T> = Result<T, TaskError>;

/// One-shot job produced by `submit`/`execute`/`schedule`.
pub(crate) struct TaskJob<T, F> {
    ctx: TaskContext,
    completion: Arc<Completion<T>>,
    body: F,
}

impl<T, F> TaskJob<T, F>
where
    T: Send + 'static,
    F: FnOnce(&TaskContext) -> BodyResult<T> + Send + 'static,
{
    pub(crate) fn new(ctx: TaskContext, completion: Arc<Completion<T>>, body: F) -> Self {
        Self {
            ctx,
            completion,
            body,
        }
    }
}

impl<T, F> Job for TaskJob<T, F>
where
    T: Send + 'static,
    F: FnOnce(&TaskContext) -> BodyResult<T> + Send + 'static,
{
    fn id(&self) -> TaskId {
        self.completion.id()
    }

    fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.completion.cancel_flag()
    }

    fn is_settled(&self) -> bool {
        self.completion.is_terminal()
    }

    fn run(self: Box<Self>) -> JobOutcome {
        if !self.completion.try_start() {
            return JobOutcome::Skipped;
        }
        let Self {
            ctx,
            completion,
            body,
        } = *self;
        let outcome = run_body(&ctx, body);
        let kind = classify(&outcome);
        completion.finish(outcome);
        kind
    }

    fn abandon(self: Box<Self>) -> bool {
        self.completion.finish(Err(ExecutorError::Cancelled))
    }

    fn reject(self: Box<Self>, reason: ExecutorError) {
        self.completion.finish(Err(reason));
    }
}

/// Run a body, turning errors and panics into `ExecutorError`s.
pub(crate) fn run_body<T, F>(ctx: &TaskContext, body: F) -> Result<T, ExecutorError>
where
    F: FnOnce(&TaskContext) -> BodyResult<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| body(ctx))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) if err.is::<Interrupted>() => Err(ExecutorError::Cancelled),
        Ok(Err(err)) => Err(ExecutorError::TaskError(format!("{err:#}"))),
        Err(payload) => Err(ExecutorError::TaskPanic(panic_message(payload.as_ref()))),
    }
}

pub(crate) fn classify<T>(outcome: &Result<T, ExecutorError>) -> JobOutcome {
    match outcome {
        Ok(_) => JobOutcome::Completed,
        Err(ExecutorError::Cancelled) => JobOutcome::Cancelled,
        Err(_) => JobOutcome::Failed,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
