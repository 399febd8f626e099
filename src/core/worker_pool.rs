//! Worker pool with dedicated OS threads.
//!
//! A fixed set of worker threads pulls jobs from a shared [`TaskQueue`],
//! executes them and publishes each outcome into the job's
//! [`FutureHandle`]. A failing or panicking task never takes its worker down.
//!
//! # Design
//!
//! - **No polling**: workers block in `recv()`; waiters block on a `Condvar`
//! - **Clean shutdown**: closing the queue lets workers drain and exit
//! - **Lock-free fast path**: atomic counters, brief critical sections only

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PoolConfig;

use super::future_handle::{Completion, TaskContext, TaskId};
use super::task::{BodyResult, Job, JobOutcome, TaskJob};
use super::{ExecutorError, FutureHandle, LogSink, TaskQueue};

/// How queued work is treated when a pool shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownMode {
    /// Stop accepting work; queued and running tasks finish normally.
    Graceful,
    /// Stop accepting work; queued tasks are cancelled without running and
    /// running tasks have their cancellation flag raised.
    Immediate,
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Currently executing tasks.
    pub active_tasks: u64,
    /// Tasks waiting in the queue.
    pub queued_tasks: u64,
    /// Total tasks accepted into the queue.
    pub submitted_tasks: u64,
    /// Total tasks that completed with a value.
    pub completed_tasks: u64,
    /// Total tasks that failed or panicked.
    pub failed_tasks: u64,
    /// Total tasks cancelled (before or while running).
    pub cancelled_tasks: u64,
    /// Total submissions refused (`QueueFull` or `PoolClosed`).
    pub rejected_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub cancelled_tasks: AtomicU64,
    pub rejected_tasks: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize, queued_tasks: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: queued_tasks as u64,
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled_tasks.load(Ordering::Relaxed),
            rejected_tasks: self.rejected_tasks.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: JobOutcome) {
        let counter = match outcome {
            JobOutcome::Completed => &self.completed_tasks,
            JobOutcome::Failed => &self.failed_tasks,
            JobOutcome::Cancelled | JobOutcome::Skipped => &self.cancelled_tasks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// State shared between the pool handle, its workers and any scheduler
/// feeding it.
pub(crate) struct PoolInner {
    pub(crate) name: Arc<str>,
    pub(crate) id: Uuid,
    queue: TaskQueue<Box<dyn Job>>,
    shutdown: AtomicBool,
    discard_queued: AtomicBool,
    next_seq: AtomicU64,
    pub(crate) counters: PoolCounters,
    /// Cancellation flags of the tasks currently running, by task id.
    running: Mutex<HashMap<TaskId, Arc<AtomicBool>>>,
    live_workers: Mutex<usize>,
    terminated: Condvar,
    pub(crate) sink: Option<Arc<dyn LogSink>>,
}

impl PoolInner {
    pub(crate) fn next_id(&self) -> TaskId {
        TaskId {
            pool: self.id,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn emit(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink.log(&self.name, message);
        }
    }

    /// Build a job for `body` and a handle observing it.
    pub(crate) fn prepare<T, F>(&self, body: F) -> (Box<dyn Job>, FutureHandle<T>)
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> BodyResult<T> + Send + 'static,
    {
        let id = self.next_id();
        let completion = Completion::new(id);
        let ctx = TaskContext::new(
            id,
            Arc::clone(&self.name),
            completion.cancel_flag(),
            self.sink.clone(),
        );
        let handle = FutureHandle::from_completion(Arc::clone(&completion));
        (Box::new(TaskJob::new(ctx, completion, body)), handle)
    }

    /// Queue a job; on refusal the job's handle is failed with the reason.
    pub(crate) fn enqueue_job(&self, job: Box<dyn Job>) -> Result<(), ExecutorError> {
        let task_id = job.id();
        if self.is_shutdown() {
            return Err(self.refuse(job, ExecutorError::PoolClosed));
        }
        match self.queue.enqueue(job) {
            Ok(()) => {
                self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(pool = %self.name, %task_id, "Task queued");
                self.emit(&format!("submit {task_id}"));
                Ok(())
            }
            Err(rejected) => {
                let reason = rejected.reason().clone();
                Err(self.refuse(rejected.into_inner(), reason))
            }
        }
    }

    fn refuse(&self, job: Box<dyn Job>, reason: ExecutorError) -> ExecutorError {
        let task_id = job.id();
        warn!(pool = %self.name, %task_id, reason = %reason, "Task rejected");
        self.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
        self.emit(&format!("reject {task_id}: {reason}"));
        job.reject(reason.clone());
        reason
    }

    fn worker_exited(&self) {
        let mut live = self.live_workers.lock();
        *live = live.saturating_sub(1);
        self.terminated.notify_all();
    }
}

/// Fixed-size pool of worker threads executing submitted tasks in FIFO
/// order.
///
/// Tasks are dequeued in submission order; with more than one worker their
/// completion order is unspecified.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    worker_count: usize,
    worker_ids: Vec<ThreadId>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.inner.name)
            .field("id", &self.inner.id)
            .field("worker_count", &self.worker_count)
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Create a pool and spawn `config.worker_count` worker threads.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::InvalidConfig` if the configuration is invalid
    /// - `ExecutorError::Internal` if a worker thread cannot be spawned
    pub fn new(config: PoolConfig) -> Result<Self, ExecutorError> {
        Self::build(config, None)
    }

    /// Like [`new`](Self::new), reporting lifecycle events to `sink`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_log_sink(config: PoolConfig, sink: Arc<dyn LogSink>) -> Result<Self, ExecutorError> {
        Self::build(config, Some(sink))
    }

    pub(crate) fn build(
        config: PoolConfig,
        sink: Option<Arc<dyn LogSink>>,
    ) -> Result<Self, ExecutorError> {
        config.validate().map_err(ExecutorError::InvalidConfig)?;

        let inner = Arc::new(PoolInner {
            name: Arc::from(config.name.as_str()),
            id: Uuid::new_v4(),
            queue: TaskQueue::new(config.queue_capacity),
            shutdown: AtomicBool::new(false),
            discard_queued: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            counters: PoolCounters::default(),
            running: Mutex::new(HashMap::new()),
            live_workers: Mutex::new(0),
            terminated: Condvar::new(),
            sink,
        });

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            match spawn_worker(worker_id, Arc::clone(&inner), config.thread_stack_size) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Workers already started drain an empty, closed queue and exit.
                    inner.shutdown.store(true, Ordering::Release);
                    inner.queue.close();
                    return Err(ExecutorError::Internal(format!(
                        "failed to spawn worker {worker_id} for pool `{}`: {e}",
                        config.name
                    )));
                }
            }
        }

        let worker_ids = workers.iter().map(|h| h.thread().id()).collect();
        info!(
            pool = %inner.name,
            pool_id = %inner.id,
            worker_count = config.worker_count,
            queue_capacity = config.queue_capacity,
            "WorkerPool started"
        );

        Ok(Self {
            inner,
            worker_count: config.worker_count,
            worker_ids,
            workers: Mutex::new(workers),
        })
    }

    pub(crate) fn inner(&self) -> &Arc<PoolInner> {
        &self.inner
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Unique pool identifier (also part of every [`TaskId`]).
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Submit a value-returning task.
    ///
    /// Never fails synchronously: if the task is refused the returned handle
    /// is already `Failed` with `QueueFull` or `PoolClosed`. Use
    /// [`try_submit`](Self::try_submit) to see refusals as an `Err`.
    pub fn submit<T, F>(&self, task: F) -> FutureHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.submit_with(move |_| Ok(task()))
    }

    /// Submit a fallible, context-aware task.
    pub fn submit_with<T, F>(&self, task: F) -> FutureHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> BodyResult<T> + Send + 'static,
    {
        let (job, handle) = self.inner.prepare(task);
        let _ = self.inner.enqueue_job(job);
        handle
    }

    /// Submit a fallible, context-aware task, reporting refusal as an error.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::QueueFull` if the bounded queue is at capacity
    /// - `ExecutorError::PoolClosed` if the pool has been shut down
    pub fn try_submit<T, F>(&self, task: F) -> Result<FutureHandle<T>, ExecutorError>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> BodyResult<T> + Send + 'static,
    {
        let (job, handle) = self.inner.prepare(task);
        self.inner.enqueue_job(job).map(|()| handle)
    }

    /// Fire-and-forget submission.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::QueueFull` if the bounded queue is at capacity
    /// - `ExecutorError::PoolClosed` if the pool has been shut down
    pub fn execute<F>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_with(move |_| {
            task();
            Ok(())
        })
    }

    /// Fire-and-forget submission of a fallible, context-aware task. Errors
    /// the body returns are logged, not propagated.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub fn execute_with<F>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: FnOnce(&TaskContext) -> BodyResult<()> + Send + 'static,
    {
        let (job, _handle) = self.inner.prepare(task);
        self.inner.enqueue_job(job)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    /// Whether the pool is shut down and every worker has exited.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.is_shutdown() && *self.inner.live_workers.lock() == 0
    }

    /// Stop accepting work and wait for the workers to finish.
    ///
    /// `Graceful` lets queued tasks run; `Immediate` cancels them and raises
    /// the cancellation flag of running tasks. Returns how many queued tasks
    /// this call cancelled.
    ///
    /// Idempotent and callable from any thread, including a task running on
    /// this pool (that worker is not waited for). A later `Immediate` call
    /// escalates an in-progress graceful shutdown.
    pub fn shutdown(&self, mode: ShutdownMode) -> usize {
        let first = !self.inner.shutdown.swap(true, Ordering::AcqRel);
        if first {
            info!(pool = %self.inner.name, ?mode, "Shutting down worker pool");
            self.inner.emit(&format!("shutdown {mode:?}"));
        }

        let mut cancelled = 0;
        if mode == ShutdownMode::Immediate {
            {
                // Held across both steps so a worker either registers its
                // job before the flags are raised or observes the discard.
                let running = self.inner.running.lock();
                self.inner.discard_queued.store(true, Ordering::Release);
                for flag in running.values() {
                    flag.store(true, Ordering::Release);
                }
            }
            self.inner.queue.close();
            for job in self.inner.queue.drain() {
                if job.abandon() {
                    cancelled += 1;
                }
            }
            self.inner
                .counters
                .cancelled_tasks
                .fetch_add(cancelled as u64, Ordering::Relaxed);
        } else {
            self.inner.queue.close();
        }

        self.wait_for_workers(None);
        self.join_workers();
        if first {
            info!(pool = %self.inner.name, cancelled, "Worker pool shut down complete");
        }
        cancelled
    }

    /// Block until every worker exited after shutdown, or `timeout` elapses.
    /// Returns `true` if the pool terminated. A timeout too large to
    /// represent waits without a deadline.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.wait_for_workers(Instant::now().checked_add(timeout))
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner
            .counters
            .snapshot(self.worker_count, self.inner.queue.len())
    }

    fn on_worker_thread(&self) -> bool {
        self.worker_ids.contains(&thread::current().id())
    }

    fn wait_for_workers(&self, deadline: Option<Instant>) -> bool {
        // A worker shutting down its own pool cannot wait for itself.
        let target = usize::from(self.on_worker_thread());
        let mut live = self.inner.live_workers.lock();
        while *live > target {
            match deadline {
                Some(deadline) => {
                    if self.inner.terminated.wait_until(&mut live, deadline).timed_out() {
                        return *live <= target;
                    }
                }
                None => self.inner.terminated.wait(&mut live),
            }
        }
        true
    }

    fn join_workers(&self) {
        let current = thread::current().id();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for (worker_id, handle) in handles.into_iter().enumerate() {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!(pool = %self.inner.name, worker_id, "Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join; workers drain the queue and exit.
        if !self.inner.shutdown.swap(true, Ordering::AcqRel) {
            self.inner.queue.close();
            debug!(pool = %self.inner.name, "WorkerPool dropped without explicit shutdown - workers will drain and exit");
        }
    }
}

/// Spawn a worker thread.
fn spawn_worker(
    worker_id: usize,
    inner: Arc<PoolInner>,
    stack_size: usize,
) -> std::io::Result<JoinHandle<()>> {
    *inner.live_workers.lock() += 1;
    let thread_inner = Arc::clone(&inner);
    let spawned = thread::Builder::new()
        .name(format!("{}-worker-{worker_id}", inner.name))
        .stack_size(stack_size)
        .spawn(move || worker_loop(worker_id, &thread_inner));
    if spawned.is_err() {
        inner.worker_exited();
    }
    spawned
}

fn worker_loop(worker_id: usize, inner: &PoolInner) {
    debug!(pool = %inner.name, worker_id, "Worker thread started");

    // Blocks until a job arrives; `None` once the queue is closed and drained.
    while let Some(job) = inner.queue.dequeue() {
        let task_id = job.id();

        if job.is_settled() {
            debug!(pool = %inner.name, worker_id, %task_id, "Skipping task cancelled while queued");
            inner.counters.record(JobOutcome::Skipped);
            continue;
        }

        {
            let mut running = inner.running.lock();
            if inner.discard_queued.load(Ordering::Acquire) {
                drop(running);
                if job.abandon() {
                    inner.counters.cancelled_tasks.fetch_add(1, Ordering::Relaxed);
                }
                continue;
            }
            running.insert(task_id, job.cancel_flag());
        }
        inner.counters.active_tasks.fetch_add(1, Ordering::Relaxed);
        debug!(pool = %inner.name, worker_id, %task_id, "Worker executing task");
        inner.emit(&format!("start {task_id}"));

        let outcome = job.run();

        inner.running.lock().remove(&task_id);
        inner.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
        inner.counters.record(outcome);
        match outcome {
            JobOutcome::Completed => inner.emit(&format!("complete {task_id}")),
            JobOutcome::Failed => {
                warn!(pool = %inner.name, worker_id, %task_id, "Task failed");
                inner.emit(&format!("fail {task_id}"));
            }
            JobOutcome::Cancelled | JobOutcome::Skipped => {
                inner.emit(&format!("cancel {task_id}"));
            }
        }
        debug!(pool = %inner.name, worker_id, %task_id, ?outcome, "Worker finished task");
    }

    debug!(pool = %inner.name, worker_id, "Worker thread exiting");
    inner.worker_exited();
}
