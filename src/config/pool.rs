//! Pool and executor-set configuration structures.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// Smallest worker thread stack accepted by validation.
pub const MIN_THREAD_STACK_SIZE: usize = 64 * 1024;

/// Default worker thread stack size.
pub const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Which executor variant a pool configuration describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// One worker, unbounded queue: strictly sequential execution.
    Single,
    /// Fixed number of workers.
    Fixed,
    /// Fixed number of workers behind a delay-managing scheduler.
    Scheduled,
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool name, used in thread names, log tags and tracing fields.
    pub name: String,
    /// Executor variant.
    pub kind: PoolKind,
    /// Number of worker threads.
    pub worker_count: usize,
    /// Maximum queued tasks before rejection; `0` means unbounded.
    pub queue_capacity: usize,
    /// Stack size for each worker thread, in bytes.
    pub thread_stack_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            kind: PoolKind::Fixed,
            worker_count: num_cpus::get(),
            queue_capacity: 0,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl PoolConfig {
    /// Default configuration (`num_cpus` workers, unbounded queue).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the executor variant.
    #[must_use]
    pub const fn with_kind(mut self, kind: PoolKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the queue capacity (`0` = unbounded).
    #[must_use]
    pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.kind == PoolKind::Single && self.worker_count != 1 {
            return Err(format!(
                "single pools run exactly one worker, got worker_count = {}",
                self.worker_count
            ));
        }
        if self.thread_stack_size < MIN_THREAD_STACK_SIZE {
            return Err(format!(
                "thread_stack_size must be at least {MIN_THREAD_STACK_SIZE} bytes"
            ));
        }
        Ok(())
    }

    /// Build a configuration from the environment.
    ///
    /// Loads a `.env` file if present, then reads `EXECUTOR_POOL_NAME`,
    /// `EXECUTOR_WORKER_COUNT`, `EXECUTOR_QUEUE_CAPACITY` and
    /// `EXECUTOR_STACK_SIZE` on top of the defaults.
    ///
    /// # Errors
    ///
    /// Fails if a variable does not parse or the result does not validate.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Ok(name) = std::env::var("EXECUTOR_POOL_NAME") {
            cfg.name = name;
        }
        if let Some(worker_count) = read_env("EXECUTOR_WORKER_COUNT")? {
            cfg.worker_count = worker_count;
        }
        if let Some(queue_capacity) = read_env("EXECUTOR_QUEUE_CAPACITY")? {
            cfg.queue_capacity = queue_capacity;
        }
        if let Some(stack_size) = read_env("EXECUTOR_STACK_SIZE")? {
            cfg.thread_stack_size = stack_size;
        }
        cfg.validate()
            .map_err(|e| anyhow::anyhow!("pool config from environment invalid: {e}"))?;
        Ok(cfg)
    }
}

fn read_env<T>(key: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: Display + Send + Sync + std::error::Error + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{key} has invalid value `{raw}`")),
        Err(_) => Ok(None),
    }
}

/// Root configuration describing a set of named executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSetConfig {
    /// Map of pool name to configuration.
    pub pools: HashMap<String, PoolConfig>,
}

impl ExecutorSetConfig {
    /// Validate all pools and ensure at least one pool exists.
    ///
    /// # Errors
    ///
    /// Returns a description naming the first invalid pool.
    pub fn validate(&self) -> Result<(), String> {
        if self.pools.is_empty() {
            return Err("at least one pool must be defined".into());
        }
        for (name, pool) in &self.pools {
            pool.validate()
                .map_err(|e| format!("pool `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Pools without an explicit `name` take their map key as name.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let mut cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        let default_name = PoolConfig::default().name;
        for (key, pool) in &mut cfg.pools {
            if pool.name == default_name {
                pool.name.clone_from(key);
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
