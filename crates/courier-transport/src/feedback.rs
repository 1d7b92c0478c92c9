//! Feedback-service reader.
//!
//! The gateway publishes device tokens it considers dead (expired
//! registrations) as a stream of fixed-size records over the same kind of
//! TLS socket the binary protocol uses. This is a thin bulk read; acting on
//! the records is the caller's business.

use crate::{ConnectionError, ConnectionResult};
use courier_config::{Config, Credentials};
use courier_protocol::{DeviceToken, TOKEN_LEN};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::info;

// [timestamp:4][token_len:2][token:32], big-endian
const RECORD_LEN: usize = 4 + 2 + TOKEN_LEN;

/// One invalid-token record from the feedback service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackRecord {
    /// Device token the gateway failed to reach.
    pub token: DeviceToken,
    /// When the gateway last failed to deliver to it, epoch seconds.
    pub timestamp: u32,
}

/// Client for the feedback endpoint.
pub struct FeedbackClient {
    manager: crate::ConnectionManager,
    config: Arc<Config>,
}

impl FeedbackClient {
    pub fn new(
        config: Arc<Config>,
        credentials: Arc<Credentials>,
    ) -> courier_config::ConfigResult<Self> {
        let manager = crate::ConnectionManager::new(config.clone(), credentials)?;
        Ok(Self { manager, config })
    }

    /// Connect to the feedback endpoint and read every record until the
    /// service closes the stream.
    pub async fn fetch(&self) -> ConnectionResult<Vec<FeedbackRecord>> {
        let endpoint = self.config.feedback_endpoint();
        let mut stream = self.manager.open_tls(&endpoint).await?;
        let records = read_records(&mut stream).await?;
        info!(count = records.len(), "fetched feedback records");
        Ok(records)
    }
}

/// Read fixed-size feedback records until end-of-file.
pub(crate) async fn read_records<S>(stream: &mut S) -> ConnectionResult<Vec<FeedbackRecord>>
where
    S: AsyncRead + Unpin,
{
    let mut records = Vec::new();
    let mut buf = [0u8; RECORD_LEN];
    loop {
        match stream.read_exact(&mut buf).await {
            Ok(_) => records.push(parse_record(&buf)?),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(records)
}

fn parse_record(buf: &[u8; RECORD_LEN]) -> ConnectionResult<FeedbackRecord> {
    let timestamp = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let token_len = u16::from_be_bytes([buf[4], buf[5]]) as usize;
    if token_len != TOKEN_LEN {
        return Err(ConnectionError::Protocol(
            courier_protocol::ProtocolError::InvalidTokenLength {
                expected: TOKEN_LEN,
                got: token_len,
            },
        ));
    }
    let token = DeviceToken::try_from(&buf[6..6 + TOKEN_LEN]).map_err(ConnectionError::Protocol)?;
    Ok(FeedbackRecord { token, timestamp })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_bytes(timestamp: u32, fill: u8) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_LEN);
        out.extend_from_slice(&timestamp.to_be_bytes());
        out.extend_from_slice(&(TOKEN_LEN as u16).to_be_bytes());
        out.extend_from_slice(&[fill; TOKEN_LEN]);
        out
    }

    #[tokio::test]
    async fn test_read_records_until_eof() {
        let mut data = Vec::new();
        data.extend(record_bytes(1_700_000_000, 0x11));
        data.extend(record_bytes(1_700_000_060, 0x22));

        let mut stream = std::io::Cursor::new(data);
        let records = read_records(&mut stream).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, 1_700_000_000);
        assert_eq!(records[0].token.as_bytes(), &[0x11; TOKEN_LEN]);
        assert_eq!(records[1].timestamp, 1_700_000_060);
        assert_eq!(records[1].token.as_bytes(), &[0x22; TOKEN_LEN]);
    }

    #[tokio::test]
    async fn test_empty_stream_yields_no_records() {
        let mut stream = std::io::Cursor::new(Vec::new());
        let records = read_records(&mut stream).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_bad_token_length_is_protocol_error() {
        let mut data = record_bytes(1_700_000_000, 0x11);
        data[5] = 16; // claim a 16-byte token
        let mut stream = std::io::Cursor::new(data);
        assert!(matches!(
            read_records(&mut stream).await,
            Err(ConnectionError::Protocol(_))
        ));
    }
}
