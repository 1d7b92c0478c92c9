//! Wire-level types for the courier daemon.
//!
//! This crate provides:
//! - Message, DeviceToken, Payload: what gets delivered
//! - Frame codec: the binary gateway protocol's notification and error frames
//! - StatusCode: the gateway's failure taxonomy, classified permanent/transient

mod error;
mod frame;
mod message;
mod payload;
mod status;

pub use error::ProtocolError;
pub use frame::{
    decode_frame, encode_frame, ErrorResponse, ERROR_COMMAND, ERROR_FRAME_LEN, NOTIFY_COMMAND,
};
pub use message::{DeviceToken, Message, Priority, Sequence, TOKEN_LEN};
pub use payload::{Payload, BINARY_PAYLOAD_LIMIT, REQUEST_PAYLOAD_LIMIT};
pub use status::StatusCode;
