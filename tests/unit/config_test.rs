//! Tests for configuration validation

use prometheus_executor::config::{ExecutorSetConfig, PoolConfig, PoolKind, MIN_THREAD_STACK_SIZE};

#[test]
fn test_pool_config_validation() {
    let valid = PoolConfig::new()
        .with_name("ingest")
        .with_worker_count(4)
        .with_queue_capacity(100);
    assert!(valid.validate().is_ok());
}

#[test]
fn test_pool_config_invalid_worker_count() {
    let invalid = PoolConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_name() {
    let invalid = PoolConfig::new().with_name("   ");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_minimum_stack() {
    let cfg = PoolConfig::new().with_thread_stack_size(MIN_THREAD_STACK_SIZE);
    assert!(cfg.validate().is_ok());
    let cfg = cfg.with_thread_stack_size(MIN_THREAD_STACK_SIZE - 1);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_executor_set_requires_pools() {
    let cfg = ExecutorSetConfig {
        pools: Default::default(),
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_executor_set_from_json() {
    let json = r#"{
        "pools": {
            "ingest": { "kind": "fixed", "worker_count": 3, "queue_capacity": 16 },
            "timers": { "kind": "scheduled", "worker_count": 2 },
            "audit":  { "kind": "single", "worker_count": 1, "name": "audit-log" }
        }
    }"#;
    let cfg = ExecutorSetConfig::from_json_str(json).unwrap();

    let ingest = &cfg.pools["ingest"];
    assert_eq!(ingest.name, "ingest");
    assert_eq!(ingest.kind, PoolKind::Fixed);
    assert_eq!(ingest.worker_count, 3);
    assert_eq!(ingest.queue_capacity, 16);

    assert_eq!(cfg.pools["timers"].kind, PoolKind::Scheduled);
    assert_eq!(cfg.pools["timers"].queue_capacity, 0);
    assert_eq!(cfg.pools["audit"].name, "audit-log");
}

#[test]
fn test_executor_set_from_json_rejects_invalid_pool() {
    let json = r#"{ "pools": { "solo": { "kind": "single", "worker_count": 4 } } }"#;
    let err = ExecutorSetConfig::from_json_str(json).unwrap_err();
    assert!(err.contains("solo"));
}

#[test]
fn test_executor_set_from_json_parse_error() {
    let err = ExecutorSetConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_pool_config_from_env() {
    // Only this test touches the EXECUTOR_* variables.
    std::env::set_var("EXECUTOR_POOL_NAME", "env-pool");
    std::env::set_var("EXECUTOR_WORKER_COUNT", "3");
    std::env::set_var("EXECUTOR_QUEUE_CAPACITY", "64");
    std::env::remove_var("EXECUTOR_STACK_SIZE");

    let cfg = PoolConfig::from_env().unwrap();
    assert_eq!(cfg.name, "env-pool");
    assert_eq!(cfg.worker_count, 3);
    assert_eq!(cfg.queue_capacity, 64);

    std::env::set_var("EXECUTOR_WORKER_COUNT", "many");
    let err = PoolConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("EXECUTOR_WORKER_COUNT"));

    std::env::remove_var("EXECUTOR_POOL_NAME");
    std::env::remove_var("EXECUTOR_WORKER_COUNT");
    std::env::remove_var("EXECUTOR_QUEUE_CAPACITY");
}
