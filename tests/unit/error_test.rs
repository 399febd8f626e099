//! Tests for error types

use prometheus_executor::core::{ExecutorError, Interrupted};

#[test]
fn test_queue_full_error() {
    assert_eq!(format!("{}", ExecutorError::QueueFull), "task queue is full");
}

#[test]
fn test_pool_closed_error() {
    assert_eq!(
        format!("{}", ExecutorError::PoolClosed),
        "pool has been shut down"
    );
}

#[test]
fn test_task_error_carries_message() {
    let err = ExecutorError::TaskError("connection reset".to_string());
    assert_eq!(format!("{}", err), "task failed: connection reset");
}

#[test]
fn test_invalid_config_error() {
    let err = ExecutorError::InvalidConfig("worker_count must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: worker_count must be greater than 0"
    );
}

#[test]
fn test_interrupted_downcasts_through_anyhow() {
    let err: anyhow::Error = Interrupted.into();
    assert!(err.is::<Interrupted>());
    assert_eq!(err.to_string(), "task interrupted by cancellation request");
}
