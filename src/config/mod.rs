//! Configuration models for pools and executor sets.

pub mod pool;

pub use pool::{
    ExecutorSetConfig, PoolConfig, PoolKind, DEFAULT_THREAD_STACK_SIZE, MIN_THREAD_STACK_SIZE,
};
