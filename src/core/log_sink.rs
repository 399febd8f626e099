//! Log sink implementations.
//!
//! Pools and task bodies report progress through an injected [`LogSink`]
//! rather than a platform logger. Two sinks ship with the crate: one that
//! forwards to `tracing`, and a bounded in-memory buffer for tests and dev.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::util::clock::now_ms;

/// A single record captured by [`InMemoryLogSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Tag identifying the source (pool name or caller supplied tag).
    pub tag: String,
    /// Message text.
    pub message: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// Logging collaborator injected into pools and schedulers.
pub trait LogSink: Send + Sync {
    /// Record a tagged message.
    fn log(&self, tag: &str, message: &str);
}

/// Sink forwarding every record to `tracing` at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, tag: &str, message: &str) {
        tracing::info!(tag = tag, "{message}");
    }
}

/// In-memory log sink with a bounded buffer. Oldest records are evicted first.
#[derive(Debug)]
pub struct InMemoryLogSink {
    records: Mutex<VecDeque<LogRecord>>,
    max_records: usize,
}

impl InMemoryLogSink {
    /// Create a new in-memory sink holding at most `max_records` records.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_records.min(1024))),
            max_records,
        }
    }

    /// Retrieve a snapshot of stored records.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Messages recorded under `tag`, oldest first.
    pub fn messages_for(&self, tag: &str) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.tag == tag)
            .map(|r| r.message.clone())
            .collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LogSink for InMemoryLogSink {
    fn log(&self, tag: &str, message: &str) {
        if self.max_records == 0 {
            return;
        }
        let mut records = self.records.lock();
        if records.len() >= self.max_records {
            records.pop_front();
        }
        records.push_back(LogRecord {
            tag: tag.to_string(),
            message: message.to_string(),
            created_at_ms: now_ms(),
        });
    }
}
