//! Walkthrough of the three executor variants.
//!
//! Run with `cargo run --example simple_executor`. Set `RUST_LOG=debug` to
//! see the pool's own lifecycle events.

use std::sync::Arc;
use std::time::Duration;

use prometheus_executor::core::{Executors, LogSink, ShutdownMode, TracingLogSink};
use prometheus_executor::util::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let executors = Executors::new().with_log_sink(Arc::new(TracingLogSink) as Arc<dyn LogSink>);

    single_worker(&executors)?;
    fixed_pool(&executors)?;
    scheduled(&executors)?;
    Ok(())
}

/// One value-returning task on a single sequential worker.
fn single_worker(executors: &Executors) -> anyhow::Result<()> {
    let pool = executors.single_worker()?;
    let handle = pool.submit_with(|ctx| {
        ctx.log("single-executor", "Callable started");
        ctx.sleep(Duration::from_millis(100))?;
        Ok("Callable Result".to_string())
    });
    println!("single worker -> {}", handle.get()?);
    pool.shutdown(ShutdownMode::Graceful);
    Ok(())
}

/// Four tasks on three workers: the fourth waits for a free worker.
fn fixed_pool(executors: &Executors) -> anyhow::Result<()> {
    let pool = executors.fixed_pool(3)?;
    for i in 0..4 {
        pool.execute_with(move |ctx| {
            ctx.log("pool-executor", &format!("Worker {i} started"));
            ctx.sleep(Duration::from_secs(1))?;
            ctx.log("pool-executor", &format!("Worker {i} finished"));
            Ok(())
        })?;
    }
    pool.shutdown(ShutdownMode::Graceful);
    println!("fixed pool -> {:?}", pool.stats());
    Ok(())
}

/// Delayed callables, a fixed-rate heartbeat, and a cancellation.
fn scheduled(executors: &Executors) -> anyhow::Result<()> {
    let scheduler = executors.scheduled(2)?;

    let callables: Vec<_> = (1..=3_u64)
        .map(|i| {
            scheduler.schedule(
                move || format!("Callable {i}"),
                Duration::from_millis(200 * i),
            )
        })
        .collect();
    let never = scheduler.schedule(|| "never printed", Duration::from_secs(5));
    let heartbeat = scheduler.schedule_at_fixed_rate_with(
        |ctx| {
            ctx.log("schedule-executor", "heartbeat");
            Ok(())
        },
        Duration::ZERO,
        Duration::from_millis(250),
    );

    for handle in &callables {
        println!("scheduled -> {}", handle.get()?);
    }
    scheduler.cancel(&never);
    scheduler.cancel(&heartbeat);
    println!("cancelled task status -> {:?}", never.status());

    scheduler.shutdown(ShutdownMode::Graceful);
    Ok(())
}
