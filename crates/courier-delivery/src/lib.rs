//! Delivery pipeline for the courier daemon.
//!
//! This crate provides:
//! - SharedQueue: the bounded FIFO all workers drain, the only state shared
//!   between them
//! - DeliveryEngine: the per-worker send loop with recovery and retry policy
//! - WorkerPool: fan-out, liveness supervision, and graceful shutdown

mod engine;
mod error;
mod pool;
mod queue;

pub use engine::{
    plan_recovery, plan_recovery_closed, DeliveryEngine, EngineConfig, EngineReport, EngineState,
    Recovery,
};
pub use error::{DeliveryError, DeliveryResult};
pub use pool::{PoolConfig, PoolReport, WorkerFactory, WorkerFuture, WorkerPool};
pub use queue::{QueueError, SharedQueue};
