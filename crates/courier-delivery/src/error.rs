//! Delivery error types.

use thiserror::Error;

/// Error surfaced by the delivery pipeline.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Queue rejected an enqueue
    #[error("Queue error: {0}")]
    Queue(#[from] crate::QueueError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] courier_config::ConfigError),

    /// Transport error
    #[error("Connection error: {0}")]
    Connection(#[from] courier_transport::ConnectionError),
}

/// Result type alias using DeliveryError.
pub type DeliveryResult<T> = Result<T, DeliveryError>;
