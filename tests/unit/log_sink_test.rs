//! Tests for log sinks

use prometheus_executor::core::{InMemoryLogSink, LogSink, TracingLogSink};

#[test]
fn test_in_memory_sink_records() {
    let sink = InMemoryLogSink::new(10);
    sink.log("pool-executor", "Worker Callable started");
    sink.log("other", "ignored");

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].tag, "pool-executor");
    assert!(records[0].created_at_ms > 0);
    assert_eq!(
        sink.messages_for("pool-executor"),
        vec!["Worker Callable started".to_string()]
    );
}

#[test]
fn test_in_memory_sink_evicts_oldest() {
    let sink = InMemoryLogSink::new(2);
    sink.log("t", "one");
    sink.log("t", "two");
    sink.log("t", "three");

    assert_eq!(sink.len(), 2);
    assert_eq!(sink.messages_for("t"), vec!["two", "three"]);
}

#[test]
fn test_zero_capacity_sink_stays_empty() {
    let sink = InMemoryLogSink::new(0);
    sink.log("t", "dropped");
    assert!(sink.is_empty());
}

#[test]
fn test_tracing_sink_is_object_safe() {
    let sink: Box<dyn LogSink> = Box::new(TracingLogSink);
    sink.log("tracing", "forwarded");
}
