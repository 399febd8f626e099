//! Tests for builder modules

use prometheus_executor::builders::{build_executors, ExecutorHandle};
use prometheus_executor::config::{ExecutorSetConfig, PoolConfig, PoolKind};
use prometheus_executor::core::{ExecutorError, InMemoryLogSink, LogSink, ShutdownMode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn set(pools: Vec<(&str, PoolConfig)>) -> ExecutorSetConfig {
    ExecutorSetConfig {
        pools: pools
            .into_iter()
            .map(|(name, cfg)| (name.to_string(), cfg))
            .collect::<HashMap<_, _>>(),
    }
}

#[test]
fn test_build_executors_by_kind() {
    let cfg = set(vec![
        (
            "cpu",
            PoolConfig::new().with_kind(PoolKind::Fixed).with_worker_count(2),
        ),
        (
            "timers",
            PoolConfig::new().with_kind(PoolKind::Scheduled).with_worker_count(1),
        ),
    ]);
    let executors = build_executors(&cfg, None).unwrap();

    let cpu = &executors["cpu"];
    assert!(matches!(cpu, ExecutorHandle::Pool(_)));
    assert!(cpu.scheduler().is_none());
    assert_eq!(cpu.pool().name(), "cpu");
    assert_eq!(cpu.pool().worker_count(), 2);
    assert_eq!(cpu.pool().submit(|| 2 + 2).get(), Ok(4));

    let timers = &executors["timers"];
    let scheduler = timers.scheduler().expect("scheduled pool");
    assert_eq!(
        scheduler.schedule(|| "tick", Duration::from_millis(5)).get(),
        Ok("tick")
    );

    for executor in executors.values() {
        executor.shutdown(ShutdownMode::Graceful);
        assert!(executor.is_shutdown());
    }
}

#[test]
fn test_build_executors_shares_sink() {
    let sink = Arc::new(InMemoryLogSink::new(64));
    let cfg = set(vec![("logged", PoolConfig::new().with_worker_count(1))]);
    let executors = build_executors(&cfg, Some(sink.clone() as Arc<dyn LogSink>)).unwrap();

    executors["logged"].pool().submit(|| ()).get().unwrap();
    executors["logged"].shutdown(ShutdownMode::Graceful);
    assert!(!sink.messages_for("logged").is_empty());
}

#[test]
fn test_build_executors_rejects_invalid_config() {
    let cfg = set(vec![("broken", PoolConfig::new().with_worker_count(0))]);
    let err = build_executors(&cfg, None).unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidConfig(ref msg) if msg.contains("broken")));
}
