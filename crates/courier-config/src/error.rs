//! Configuration error types.

use thiserror::Error;

/// Error raised while loading or validating configuration.
///
/// Configuration problems are fatal: they are surfaced at construction time
/// and never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Unrecognized environment name
    #[error("Unknown environment: {0} (expected \"production\" or \"sandbox\")")]
    InvalidEnvironment(String),

    /// Unrecognized protocol name
    #[error("Unknown protocol: {0} (expected \"binary\" or \"request\")")]
    InvalidProtocol(String),

    /// Credential file missing, unreadable, or unparsable
    #[error("Credential error: {0}")]
    Credential(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// TLS setup error
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
