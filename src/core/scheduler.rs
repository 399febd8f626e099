//! Delayed and fixed-rate task scheduling on top of a [`WorkerPool`].
//!
//! One delay thread per scheduler keeps pending entries in a min-heap ordered
//! by fire time (ties broken by submission order). When an entry comes due it
//! is moved into the pool's queue; the heap never runs task bodies itself.
//!
//! Fixed-rate tasks never overlap: if the previous run is still queued or
//! executing when the next fire time arrives, that firing is skipped instead
//! of queued, so a slow body cannot build an unbounded backlog.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::util::clock::saturating_deadline;

use super::future_handle::{Completion, TaskContext, TaskId};
use super::task::{classify, run_body, BodyResult, Job, JobOutcome};
use super::worker_pool::PoolInner;
use super::{ExecutorError, FutureHandle, LogSink, ShutdownMode, WorkerPool};

type PeriodicBody = Box<dyn Fn(&TaskContext) -> BodyResult<()> + Send + Sync>;

/// A fixed-rate task shared between its heap entry and its in-flight run.
struct PeriodicTask {
    ctx: TaskContext,
    completion: Arc<Completion<()>>,
    body: PeriodicBody,
    period: Duration,
    in_flight: AtomicBool,
    runs: AtomicU64,
    skipped: AtomicU64,
}

impl PeriodicTask {
    fn is_settled(&self) -> bool {
        self.completion.is_terminal()
    }

    /// Queue one run unless the previous one is still in flight.
    fn trigger(self: &Arc<Self>, pool: &PoolInner) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(pool = %pool.name, task_id = %self.ctx.id(), skipped, "Previous run still in flight, skipping firing");
            return;
        }
        // On refusal the run's `reject` settles the handle.
        let _ = pool.enqueue_job(Box::new(PeriodicRun {
            task: Arc::clone(self),
        }));
    }
}

/// One queued execution of a [`PeriodicTask`].
struct PeriodicRun {
    task: Arc<PeriodicTask>,
}

impl Job for PeriodicRun {
    fn id(&self) -> TaskId {
        self.task.ctx.id()
    }

    fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.task.completion.cancel_flag()
    }

    fn is_settled(&self) -> bool {
        self.task.is_settled()
    }

    fn run(self: Box<Self>) -> JobOutcome {
        let task = &self.task;
        if task.is_settled() {
            task.in_flight.store(false, Ordering::Release);
            return JobOutcome::Skipped;
        }
        let outcome = run_body(&task.ctx, |ctx| (task.body)(ctx));
        let kind = classify(&outcome);
        match outcome {
            Ok(()) => {
                let runs = task.runs.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(task_id = %task.ctx.id(), runs, "Fixed-rate run finished");
            }
            // A failed run ends the series; the handle carries the error.
            Err(err) => {
                task.completion.finish(Err(err));
            }
        }
        task.in_flight.store(false, Ordering::Release);
        kind
    }

    fn abandon(self: Box<Self>) -> bool {
        self.task.in_flight.store(false, Ordering::Release);
        self.task.completion.finish(Err(ExecutorError::Cancelled))
    }

    fn reject(self: Box<Self>, reason: ExecutorError) {
        self.task.in_flight.store(false, Ordering::Release);
        self.task.completion.finish(Err(reason));
    }
}

enum EntryKind {
    Once(Box<dyn Job>),
    Periodic(Arc<PeriodicTask>),
}

/// A task waiting in the delay heap.
struct ScheduledEntry {
    fire_at: Instant,
    seq: u64,
    id: TaskId,
    kind: EntryKind,
}

impl ScheduledEntry {
    fn is_settled(&self) -> bool {
        match &self.kind {
            EntryKind::Once(job) => job.is_settled(),
            EntryKind::Periodic(task) => task.is_settled(),
        }
    }

    fn is_periodic(&self) -> bool {
        matches!(self.kind, EntryKind::Periodic(_))
    }

    /// Settle as cancelled without running.
    fn abandon(self) -> bool {
        match self.kind {
            EntryKind::Once(job) => job.abandon(),
            EntryKind::Periodic(task) => task.completion.finish(Err(ExecutorError::Cancelled)),
        }
    }
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.fire_at
            .cmp(&other.fire_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

struct TimerState {
    heap: BinaryHeap<Reverse<ScheduledEntry>>,
    next_seq: u64,
    /// `Some` once shutdown began.
    shutdown: Option<ShutdownMode>,
    /// Follow-up entries the delay thread cancelled after shutdown began.
    late_cancelled: usize,
}

impl TimerState {
    /// Put a fixed-rate follow-up back in the heap, or cancel it if shutdown
    /// began while it was being fired.
    fn requeue(&mut self, next: ScheduledEntry) {
        if self.shutdown.is_some() {
            if next.abandon() {
                self.late_cancelled += 1;
            }
        } else {
            self.heap.push(Reverse(next));
        }
    }
}

struct TimerShared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
    pool: Arc<PoolInner>,
}

impl TimerShared {
    fn push(&self, state: &mut MutexGuard<'_, TimerState>, fire_at: Instant, id: TaskId, kind: EntryKind) {
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Reverse(ScheduledEntry {
            fire_at,
            seq,
            id,
            kind,
        }));
        self.wakeup.notify_one();
    }

    /// Move a due entry into the pool. Returns the follow-up entry for
    /// fixed-rate tasks.
    fn fire(&self, entry: ScheduledEntry) -> Option<ScheduledEntry> {
        if entry.is_settled() {
            debug!(pool = %self.pool.name, task_id = %entry.id, "Dropping settled scheduled entry");
            return None;
        }
        match entry.kind {
            EntryKind::Once(job) => {
                let _ = self.pool.enqueue_job(job);
                None
            }
            EntryKind::Periodic(task) => {
                task.trigger(&self.pool);
                if task.is_settled() {
                    return None;
                }
                Some(ScheduledEntry {
                    fire_at: saturating_deadline(entry.fire_at, task.period),
                    seq: entry.seq,
                    id: entry.id,
                    kind: EntryKind::Periodic(task),
                })
            }
        }
    }
}

fn timer_loop(shared: &TimerShared) {
    debug!(pool = %shared.pool.name, "Scheduler delay thread started");
    let mut state = shared.state.lock();
    loop {
        match state.shutdown {
            Some(ShutdownMode::Immediate) => break,
            Some(ShutdownMode::Graceful) if state.heap.is_empty() => break,
            _ => {}
        }

        let Some(next_fire) = state.heap.peek().map(|Reverse(e)| e.fire_at) else {
            shared.wakeup.wait(&mut state);
            continue;
        };
        if next_fire > Instant::now() {
            shared.wakeup.wait_until(&mut state, next_fire);
            continue;
        }
        let Some(Reverse(entry)) = state.heap.pop() else {
            continue;
        };

        let follow_up = MutexGuard::unlocked(&mut state, || shared.fire(entry));
        if let Some(next) = follow_up {
            state.requeue(next);
        }
    }
    debug!(pool = %shared.pool.name, "Scheduler delay thread exiting");
}

/// Executor supporting delayed and fixed-rate tasks, backed by its own
/// [`WorkerPool`].
pub struct Scheduler {
    pool: WorkerPool,
    shared: Arc<TimerShared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pool", &self.pool)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler with `config.worker_count` workers and one delay
    /// thread.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::InvalidConfig` if the configuration is invalid
    /// - `ExecutorError::Internal` if a thread cannot be spawned
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
        let pool = WorkerPool::build(config, sink)?;
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shutdown: None,
                late_cancelled: 0,
            }),
            wakeup: Condvar::new(),
            pool: Arc::clone(pool.inner()),
        });

        let thread_shared = Arc::clone(&shared);
        let timer = thread::Builder::new()
            .name(format!("{}-scheduler", pool.name()))
            .spawn(move || timer_loop(&thread_shared))
            .map_err(|e| {
                pool.shutdown(ShutdownMode::Immediate);
                ExecutorError::Internal(format!(
                    "failed to spawn delay thread for `{}`: {e}",
                    pool.name()
                ))
            })?;

        info!(pool = %pool.name(), "Scheduler started");
        Ok(Self {
            pool,
            shared,
            timer: Mutex::new(Some(timer)),
        })
    }

    /// The worker pool executing due tasks.
    #[must_use]
    pub const fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run `task` once after `delay`.
    pub fn schedule<T, F>(&self, task: F, delay: Duration) -> FutureHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.schedule_with(move |_| Ok(task()), delay)
    }

    /// Run a fallible, context-aware `task` once after `delay`.
    ///
    /// Cancelling the handle before the delay elapses guarantees the body
    /// never runs. A delay too large to represent is clamped to
    /// [`FAR_FUTURE`](crate::util::clock::FAR_FUTURE).
    pub fn schedule_with<T, F>(&self, task: F, delay: Duration) -> FutureHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> BodyResult<T> + Send + 'static,
    {
        let inner = self.pool.inner();
        let (job, handle) = inner.prepare(task);
        let id = handle.id();

        let mut state = self.shared.state.lock();
        if state.shutdown.is_some() {
            drop(state);
            warn!(pool = %inner.name, task_id = %id, "Schedule rejected: scheduler shut down");
            inner.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
            job.reject(ExecutorError::PoolClosed);
            return handle;
        }
        self.shared
            .push(&mut state, saturating_deadline(Instant::now(), delay), id, EntryKind::Once(job));
        debug!(pool = %inner.name, task_id = %id, ?delay, "Task scheduled");
        handle
    }

    /// Run `task` after `initial_delay`, then every `period`.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        task: F,
        initial_delay: Duration,
        period: Duration,
    ) -> FutureHandle<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.schedule_at_fixed_rate_with(
            move |_| {
                task();
                Ok(())
            },
            initial_delay,
            period,
        )
    }

    /// Run a fallible, context-aware `task` after `initial_delay`, then every
    /// `period` measured from the previous fire time.
    ///
    /// A firing is skipped while the previous run is still queued or running.
    /// The handle never completes on its own: it settles as `Cancelled` when
    /// cancelled (further firings stop, an in-flight run is not interrupted)
    /// or as `Failed` when a run fails or panics. A zero `period` fails the
    /// handle with `InvalidConfig`.
    pub fn schedule_at_fixed_rate_with<F>(
        &self,
        task: F,
        initial_delay: Duration,
        period: Duration,
    ) -> FutureHandle<()>
    where
        F: Fn(&TaskContext) -> BodyResult<()> + Send + Sync + 'static,
    {
        let inner = self.pool.inner();
        let id = inner.next_id();
        let completion = Completion::new(id);
        let handle = FutureHandle::from_completion(Arc::clone(&completion));

        if period.is_zero() {
            completion.finish(Err(ExecutorError::InvalidConfig(
                "fixed-rate period must be greater than zero".into(),
            )));
            return handle;
        }

        let task = Arc::new(PeriodicTask {
            ctx: TaskContext::new(
                id,
                Arc::clone(&inner.name),
                completion.cancel_flag(),
                inner.sink.clone(),
            ),
            completion,
            body: Box::new(task),
            period,
            in_flight: AtomicBool::new(false),
            runs: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        });

        let mut state = self.shared.state.lock();
        if state.shutdown.is_some() {
            drop(state);
            inner.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
            task.completion.finish(Err(ExecutorError::PoolClosed));
            return handle;
        }
        self.shared.push(
            &mut state,
            saturating_deadline(Instant::now(), initial_delay),
            id,
            EntryKind::Periodic(task),
        );
        debug!(pool = %inner.name, task_id = %id, ?initial_delay, ?period, "Fixed-rate task scheduled");
        handle
    }

    /// Cancel a scheduled (or submitted) task and drop it from the delay
    /// heap. Returns `true` if the handle's state changed.
    pub fn cancel<T>(&self, handle: &FutureHandle<T>) -> bool {
        let accepted = handle.cancel(false);
        let id = handle.id();
        let mut state = self.shared.state.lock();
        state.heap.retain(|Reverse(entry)| entry.id != id);
        self.shared.wakeup.notify_one();
        accepted
    }

    /// Submit a value-returning task for immediate execution.
    pub fn submit<T, F>(&self, task: F) -> FutureHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.pool.submit(task)
    }

    /// Submit a fallible, context-aware task for immediate execution.
    pub fn submit_with<T, F>(&self, task: F) -> FutureHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> BodyResult<T> + Send + 'static,
    {
        self.pool.submit_with(task)
    }

    /// Fire-and-forget submission for immediate execution.
    ///
    /// # Errors
    ///
    /// `ExecutorError::PoolClosed` after shutdown, `QueueFull` if the bounded
    /// queue is at capacity.
    pub fn execute<F>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.execute(task)
    }

    /// Number of entries waiting for their fire time.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().heap.len()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown.is_some()
    }

    /// Stop scheduling and shut down the backing pool.
    ///
    /// `Graceful` cancels fixed-rate tasks, still fires the one-shot entries
    /// already scheduled (waiting for their delays), then drains the pool.
    /// `Immediate` cancels every pending entry and shuts the pool down
    /// immediately. Returns how many pending entries and queued tasks were
    /// cancelled. Idempotent; `Immediate` escalates a graceful shutdown.
    pub fn shutdown(&self, mode: ShutdownMode) -> usize {
        let mut cancelled = 0;
        {
            let mut state = self.shared.state.lock();
            if state.shutdown.is_none() || mode == ShutdownMode::Immediate {
                state.shutdown = Some(mode);
            }
            let pending = std::mem::take(&mut state.heap).into_vec();
            for Reverse(entry) in pending {
                if mode == ShutdownMode::Immediate || entry.is_periodic() {
                    if entry.abandon() {
                        cancelled += 1;
                    }
                } else {
                    state.heap.push(Reverse(entry));
                }
            }
            self.shared.wakeup.notify_all();
        }

        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            if timer.join().is_err() {
                warn!(pool = %self.pool.name(), "Scheduler delay thread panicked");
            }
        }
        cancelled += std::mem::take(&mut self.shared.state.lock().late_cancelled);
        cancelled + self.pool.shutdown(mode)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Cancel pending entries and stop the delay thread without joining it.
        let mut state = self.shared.state.lock();
        if state.shutdown.is_none() {
            state.shutdown = Some(ShutdownMode::Immediate);
            for Reverse(entry) in std::mem::take(&mut state.heap).into_vec() {
                entry.abandon();
            }
            self.shared.wakeup.notify_all();
            debug!(pool = %self.pool.name(), "Scheduler dropped without explicit shutdown");
        }
    }
}
