//! Transport error types.

use courier_protocol::ProtocolError;
use thiserror::Error;

/// Transport-level failure: connecting, writing, or reading the gateway.
///
/// Connection errors are retried inside the connect loop up to the configured
/// bound and only surface to the caller once retries are exhausted.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup or handshake error
    #[error("TLS error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    /// Endpoint host is not a valid server name
    #[error("Invalid server name: {0}")]
    InvalidServerName(#[from] tokio_rustls::rustls::pki_types::InvalidDnsNameError),

    /// Endpoint string is not host:port
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed gateway response; transient, triggers reconnect
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Operation on a connection that is not open
    #[error("Not connected to gateway")]
    NotConnected,

    /// Connect attempt timed out
    #[error("Connect timed out")]
    Timeout,

    /// Every connect attempt failed
    #[error("Connect failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Result type alias using ConnectionError.
pub type ConnectionResult<T> = Result<T, ConnectionError>;
