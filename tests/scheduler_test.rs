//! Integration tests for Scheduler
//!
//! Covers delayed execution, fixed-rate firing without overlap, cancellation
//! of pending and periodic entries, and both shutdown modes.

use prometheus_executor::core::{ExecutorError, Executors, ShutdownMode, TaskStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// DELAYED TASKS
// ============================================================================

#[test]
fn test_delayed_tasks_fire_in_deadline_order() {
    let scheduler = Executors::new().scheduled(1).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = [120_u64, 40, 80]
        .into_iter()
        .map(|delay| {
            let order = Arc::clone(&order);
            scheduler.schedule(
                move || order.lock().unwrap().push(delay),
                Duration::from_millis(delay),
            )
        })
        .collect();

    for handle in &handles {
        handle.get().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![40, 80, 120]);
    scheduler.shutdown(ShutdownMode::Graceful);
}

#[test]
fn test_scheduled_callables_return_values() {
    let scheduler = Executors::new().scheduled(2).unwrap();
    let handles: Vec<_> = (0..3_u64)
        .map(|i| scheduler.schedule(move || format!("Callable {i}"), Duration::from_millis(10 * i)))
        .collect();

    let results: Vec<String> = handles.iter().map(|h| h.get().unwrap()).collect();
    assert_eq!(results, vec!["Callable 0", "Callable 1", "Callable 2"]);
    scheduler.shutdown(ShutdownMode::Graceful);
}

#[test]
fn test_immediate_submission_bypasses_delay_heap() {
    let scheduler = Executors::new().scheduled(1).unwrap();
    let handle = scheduler.submit(|| 3);
    assert_eq!(handle.get(), Ok(3));
    assert_eq!(scheduler.pending_count(), 0);
    scheduler.execute(|| {}).unwrap();
    scheduler.shutdown(ShutdownMode::Graceful);
}

// ============================================================================
// FIXED RATE
// ============================================================================

#[test]
fn test_fixed_rate_fires_repeatedly() {
    let scheduler = Executors::new().scheduled(1).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);

    let handle = scheduler.schedule_at_fixed_rate(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        Duration::ZERO,
        Duration::from_millis(20),
    );

    thread::sleep(Duration::from_millis(250));
    assert!(count.load(Ordering::SeqCst) >= 3);
    assert_eq!(handle.status(), TaskStatus::Pending);

    assert!(scheduler.cancel(&handle));
    assert!(handle.is_cancelled());
    scheduler.shutdown(ShutdownMode::Graceful);
}

#[test]
fn test_fixed_rate_runs_never_overlap() {
    let scheduler = Executors::new().scheduled(4).unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let max_running = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    let (r, m, n) = (Arc::clone(&running), Arc::clone(&max_running), Arc::clone(&runs));
    // Body duration (60ms) exceeds the period (10ms).
    let handle = scheduler.schedule_at_fixed_rate(
        move || {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            m.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(60));
            r.fetch_sub(1, Ordering::SeqCst);
            n.fetch_add(1, Ordering::SeqCst);
        },
        Duration::ZERO,
        Duration::from_millis(10),
    );

    thread::sleep(Duration::from_millis(400));
    scheduler.cancel(&handle);
    scheduler.shutdown(ShutdownMode::Graceful);

    assert_eq!(max_running.load(Ordering::SeqCst), 1);
    let total = runs.load(Ordering::SeqCst);
    assert!(total >= 2, "only {total} runs");
    // Skipped firings are not queued up as a backlog.
    assert!(total <= 8, "{total} runs");
}

#[test]
fn test_cancel_stops_further_firings() {
    let scheduler = Executors::new().scheduled(1).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);

    let handle = scheduler.schedule_at_fixed_rate(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        Duration::from_millis(10),
        Duration::from_millis(20),
    );
    thread::sleep(Duration::from_millis(100));
    assert!(scheduler.cancel(&handle));
    thread::sleep(Duration::from_millis(40));

    let after_cancel = count.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(120));
    assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    assert_eq!(scheduler.pending_count(), 0);
    scheduler.shutdown(ShutdownMode::Graceful);
}

#[test]
fn test_failing_fixed_rate_task_stops_series() {
    let scheduler = Executors::new().scheduled(1).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);

    let handle = scheduler.schedule_at_fixed_rate_with(
        move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                anyhow::bail!("third run failed");
            }
            Ok(())
        },
        Duration::ZERO,
        Duration::from_millis(10),
    );

    match handle.get_timeout(Duration::from_secs(5)) {
        Err(ExecutorError::TaskError(msg)) => assert!(msg.contains("third run failed")),
        other => panic!("expected TaskError, got {other:?}"),
    }
    thread::sleep(Duration::from_millis(60));
    assert_eq!(count.load(Ordering::SeqCst), 3);
    scheduler.shutdown(ShutdownMode::Graceful);
}

#[test]
fn test_huge_period_keeps_delay_thread_alive() {
    let scheduler = Executors::new().scheduled(1).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);

    let periodic = scheduler.schedule_at_fixed_rate(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        Duration::ZERO,
        Duration::MAX,
    );
    thread::sleep(Duration::from_millis(30));

    let later = scheduler.schedule(|| 7, Duration::from_millis(10));
    assert_eq!(later.get_timeout(Duration::from_secs(2)), Ok(7));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(periodic.status(), TaskStatus::Pending);
    assert_eq!(scheduler.shutdown(ShutdownMode::Immediate), 1);
    assert!(periodic.is_cancelled());
}

#[test]
fn test_unbounded_delays_are_accepted() {
    let scheduler = Executors::new().scheduled(1).unwrap();
    let one_shot = scheduler.schedule(|| 1, Duration::MAX);
    let periodic = scheduler.schedule_at_fixed_rate(|| {}, Duration::MAX, Duration::from_secs(1));
    assert_eq!(scheduler.pending_count(), 2);

    assert_eq!(
        one_shot.get_timeout(Duration::from_millis(20)),
        Err(ExecutorError::TimedOut)
    );
    let soon = scheduler.schedule(|| "soon", Duration::from_millis(5));
    assert_eq!(soon.get_timeout(Duration::from_secs(2)), Ok("soon"));

    assert!(scheduler.cancel(&one_shot));
    assert_eq!(scheduler.shutdown(ShutdownMode::Immediate), 1);
    assert!(periodic.is_cancelled());
}

// ============================================================================
// SHUTDOWN
// ============================================================================

#[test]
fn test_graceful_shutdown_fires_pending_one_shots() {
    let scheduler = Executors::new().scheduled(1).unwrap();
    let one_shot = scheduler.schedule(|| "late", Duration::from_millis(80));
    let periodic = scheduler.schedule_at_fixed_rate(|| {}, Duration::from_secs(10), Duration::from_secs(1));

    let start = Instant::now();
    let cancelled = scheduler.shutdown(ShutdownMode::Graceful);

    assert_eq!(cancelled, 1);
    assert!(start.elapsed() >= Duration::from_millis(60));
    assert_eq!(one_shot.get(), Ok("late"));
    assert!(periodic.is_cancelled());
    assert!(scheduler.pool().is_terminated());
}

#[test]
fn test_immediate_shutdown_cancels_pending_entries() {
    let scheduler = Executors::new().scheduled(1).unwrap();
    let handles: Vec<_> = (0..3)
        .map(|i| scheduler.schedule(move || i, Duration::from_secs(30)))
        .collect();
    assert_eq!(scheduler.pending_count(), 3);

    let start = Instant::now();
    assert_eq!(scheduler.shutdown(ShutdownMode::Immediate), 3);
    assert!(start.elapsed() < Duration::from_secs(5));

    for handle in &handles {
        assert_eq!(handle.get(), Err(ExecutorError::Cancelled));
    }
    assert_eq!(scheduler.pending_count(), 0);
    assert!(scheduler.is_shutdown());
}

#[test]
fn test_scheduled_tasks_run_on_pool_workers() {
    let scheduler = Executors::new().scheduled(1).unwrap();
    let name = scheduler
        .schedule(|| thread::current().name().map(str::to_string), Duration::ZERO)
        .get()
        .unwrap();
    assert_eq!(name.as_deref(), Some("schedule-executor-worker-0"));
    scheduler.shutdown(ShutdownMode::Graceful);
}
