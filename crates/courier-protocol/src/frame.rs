//! Binary gateway frame codec.
//!
//! Notification frames flow client → gateway, error frames gateway → client.
//! The layouts are fixed and big-endian; they must be reproduced bit-exact.

use crate::message::{DeviceToken, Message, Priority, TOKEN_LEN};
use crate::status::StatusCode;
use crate::ProtocolError;

/// Command byte of a notification frame.
pub const NOTIFY_COMMAND: u8 = 1;

/// Command byte of an error frame.
pub const ERROR_COMMAND: u8 = 8;

/// Length of an error frame: command, status, identifier.
pub const ERROR_FRAME_LEN: usize = 6;

// [cmd:1][id:4][expiry:4][token:32][payload_len:2] header, then payload, then [priority:1]
const HEADER_LEN: usize = 1 + 4 + 4 + TOKEN_LEN + 2;

/// Encode a message into its notification frame.
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    if msg.payload.len() > u16::MAX as usize {
        return Err(ProtocolError::PayloadTooLarge {
            size: msg.payload.len(),
            limit: u16::MAX as usize,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + msg.payload.len() + 1);
    frame.push(NOTIFY_COMMAND);
    frame.extend_from_slice(&msg.id.to_be_bytes());
    frame.extend_from_slice(&msg.expiry.unwrap_or(0).to_be_bytes());
    frame.extend_from_slice(msg.token.as_bytes());
    frame.extend_from_slice(&(msg.payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&msg.payload);
    frame.push(msg.priority.as_u8());
    Ok(frame)
}

/// Decode a notification frame back into a message.
pub fn decode_frame(frame: &[u8]) -> Result<Message, ProtocolError> {
    if frame.len() < HEADER_LEN + 1 {
        return Err(ProtocolError::FrameTruncated {
            need: HEADER_LEN + 1,
            got: frame.len(),
        });
    }
    if frame[0] != NOTIFY_COMMAND {
        return Err(ProtocolError::UnexpectedCommand(frame[0]));
    }

    let id = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
    let expiry = u32::from_be_bytes([frame[5], frame[6], frame[7], frame[8]]);
    let token = DeviceToken::try_from(&frame[9..9 + TOKEN_LEN])?;
    let len_at = 9 + TOKEN_LEN;
    let payload_len = u16::from_be_bytes([frame[len_at], frame[len_at + 1]]) as usize;

    let need = HEADER_LEN + payload_len + 1;
    if frame.len() < need {
        return Err(ProtocolError::FrameTruncated {
            need,
            got: frame.len(),
        });
    }
    let payload = frame[HEADER_LEN..HEADER_LEN + payload_len].to_vec();
    let priority = Priority::from_u8(frame[HEADER_LEN + payload_len]);

    let mut msg = Message::new(id, token, payload).with_priority(priority);
    if expiry != 0 {
        msg.expiry = Some(expiry);
    }
    Ok(msg)
}

/// Error frame returned asynchronously by the binary gateway.
///
/// Ephemeral: decoded and consumed immediately by the delivery engine's
/// recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Failure classification.
    pub status: StatusCode,
    /// Identifier of the rejected message.
    pub id: u32,
}

impl ErrorResponse {
    /// Decode the fixed-size error frame.
    pub fn decode(frame: &[u8; ERROR_FRAME_LEN]) -> Result<Self, ProtocolError> {
        if frame[0] != ERROR_COMMAND {
            return Err(ProtocolError::UnexpectedCommand(frame[0]));
        }
        Ok(Self {
            status: StatusCode::from_u8(frame[1]),
            id: u32::from_be_bytes([frame[2], frame[3], frame[4], frame[5]]),
        })
    }

    /// Encode an error frame, as the gateway would.
    pub fn encode(&self) -> [u8; ERROR_FRAME_LEN] {
        let id = self.id.to_be_bytes();
        [
            ERROR_COMMAND,
            self.status.as_u8(),
            id[0],
            id[1],
            id[2],
            id[3],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::test_token;

    #[test]
    fn test_frame_roundtrip() {
        let msg = Message::new(42, test_token(0xab), br#"{"aps":{"alert":"hi"}}"#.to_vec())
            .with_expiry(1_700_000_000)
            .with_priority(Priority::Conserve);

        let frame = encode_frame(&msg).unwrap();
        let decoded = decode_frame(&frame).unwrap();

        assert_eq!(decoded.id, msg.id);
        assert_eq!(decoded.token, msg.token);
        assert_eq!(decoded.expiry, msg.expiry);
        assert_eq!(decoded.priority, msg.priority);
        assert_eq!(decoded.payload, msg.payload);
    }

    #[test]
    fn test_frame_layout_is_bit_exact() {
        let msg = Message::new(0x01020304, test_token(0xff), vec![0xaa, 0xbb]);
        let frame = encode_frame(&msg).unwrap();

        assert_eq!(frame[0], NOTIFY_COMMAND);
        assert_eq!(&frame[1..5], &[0x01, 0x02, 0x03, 0x04]);
        // No expiry serializes as zero
        assert_eq!(&frame[5..9], &[0, 0, 0, 0]);
        assert_eq!(&frame[9..41], &[0xff; TOKEN_LEN]);
        assert_eq!(&frame[41..43], &[0x00, 0x02]);
        assert_eq!(&frame[43..45], &[0xaa, 0xbb]);
        assert_eq!(frame[45], 10);
        assert_eq!(frame.len(), 46);
    }

    #[test]
    fn test_decode_rejects_wrong_command() {
        let msg = Message::new(1, test_token(0), vec![1]);
        let mut frame = encode_frame(&msg).unwrap();
        frame[0] = 9;
        assert!(matches!(
            decode_frame(&frame),
            Err(ProtocolError::UnexpectedCommand(9))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_frame() {
        let msg = Message::new(1, test_token(0), vec![1, 2, 3]);
        let frame = encode_frame(&msg).unwrap();
        assert!(matches!(
            decode_frame(&frame[..frame.len() - 2]),
            Err(ProtocolError::FrameTruncated { .. })
        ));
    }

    #[test]
    fn test_error_frame_roundtrip() {
        let err = ErrorResponse {
            status: StatusCode::InvalidToken,
            id: 0xdeadbeef,
        };
        let decoded = ErrorResponse::decode(&err.encode()).unwrap();
        assert_eq!(decoded, err);
    }

    #[test]
    fn test_error_frame_decode() {
        let frame = [ERROR_COMMAND, 8, 0, 0, 0, 7];
        let err = ErrorResponse::decode(&frame).unwrap();
        assert_eq!(err.status, StatusCode::InvalidToken);
        assert_eq!(err.id, 7);
    }

    #[test]
    fn test_error_frame_rejects_wrong_command() {
        let frame = [NOTIFY_COMMAND, 8, 0, 0, 0, 7];
        assert!(matches!(
            ErrorResponse::decode(&frame),
            Err(ProtocolError::UnexpectedCommand(1))
        ));
    }
}
