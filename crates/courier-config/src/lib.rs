//! Configuration and credential handling for the courier daemon.
//!
//! This crate provides:
//! - Config: environment/protocol selection, gateway endpoints, timing knobs
//! - Credentials: PEM certificate/key material loaded and validated up front
//! - init_logging: tracing-subscriber setup shared by all binaries

mod config;
mod credentials;
mod error;
mod logging;

pub use config::{
    Config, Environment, Protocol, DEFAULT_CONNECT_RETRY_COUNT, DEFAULT_CONNECT_RETRY_INTERVAL_US,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_LOG_LEVEL,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_CEILING, DEFAULT_SELECT_TIMEOUT_US,
    DEFAULT_TOKEN_LIFETIME_SECS, DEFAULT_WORKERS, DEFAULT_WRITE_INTERVAL_US,
};
pub use credentials::Credentials;
pub use error::{ConfigError, ConfigResult};
pub use logging::init_logging;
