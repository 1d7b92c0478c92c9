//! Protocol error types.

use thiserror::Error;

/// Error raised while encoding or decoding wire data.
///
/// A malformed server response is treated as transient by callers: the
/// connection is torn down and re-established.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Serialized payload exceeds the protocol's limit
    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Device token is not the expected length
    #[error("Device token must be {expected} bytes, got {got}")]
    InvalidTokenLength { expected: usize, got: usize },

    /// Device token is not valid hex
    #[error("Invalid device token hex: {0}")]
    InvalidTokenHex(#[from] hex::FromHexError),

    /// Frame shorter than its fixed layout requires
    #[error("Frame truncated: need {need} bytes, got {got}")]
    FrameTruncated { need: usize, got: usize },

    /// Frame carried an unexpected command byte
    #[error("Unexpected command byte: {0}")]
    UnexpectedCommand(u8),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
