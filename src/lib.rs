//! # Prometheus Executor
//!
//! A bounded task-execution core: worker-pool executors supporting
//! fire-and-forget tasks, future-returning tasks, and delayed or fixed-rate
//! scheduled tasks with cooperative cancellation and graceful shutdown.
//!
//! ## Components
//!
//! - **[`TaskQueue`](core::TaskQueue)**: FIFO of pending tasks, optionally
//!   bounded; a full bounded queue rejects with `QueueFull` (backpressure)
//! - **[`WorkerPool`](core::WorkerPool)**: fixed set of OS threads draining
//!   the queue; task errors and panics are captured, never fatal to a worker
//! - **[`FutureHandle`](core::FutureHandle)**: completion token with blocking,
//!   timed and async waits, and cooperative cancellation
//! - **[`Scheduler`](core::Scheduler)**: delay thread feeding a pool with
//!   delayed and non-overlapping fixed-rate tasks
//! - **[`Executors`](core::Executors)**: single-worker, fixed and scheduled
//!   presets
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use prometheus_executor::core::{Executors, ShutdownMode};
//!
//! let executors = Executors::new();
//!
//! // Fixed pool of 3: a 4th task waits for a free worker.
//! let pool = executors.fixed_pool(3)?;
//! let handles: Vec<_> = (0..4)
//!     .map(|i| pool.submit(move || { std::thread::sleep(Duration::from_millis(100)); i }))
//!     .collect();
//! for handle in &handles {
//!     handle.get()?;
//! }
//! pool.shutdown(ShutdownMode::Graceful);
//!
//! // Scheduled pool: run once after a delay, cancellable until it fires.
//! let scheduler = executors.scheduled(2)?;
//! let later = scheduler.schedule(|| "fired", Duration::from_millis(50));
//! assert_eq!(later.get()?, "fired");
//! scheduler.shutdown(ShutdownMode::Graceful);
//! # Ok::<(), prometheus_executor::core::ExecutorError>(())
//! ```
//!
//! Cancellation is advisory: a pending task that is cancelled never runs,
//! while a running task only sees a flag through
//! [`TaskContext`](core::TaskContext).

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Task queue, worker pool, futures, scheduling and the executor presets.
pub mod core;
/// Configuration models for pools and executor sets.
pub mod config;
/// Builders to construct executors from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
