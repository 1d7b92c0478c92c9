//! Persistent binary-protocol connection.
//!
//! The gateway never acknowledges a successful write. The only failure
//! signals are a delayed 6-byte error frame and socket closure, so every
//! write is followed by a bounded wait on the read side: silence within the
//! window counts as acceptance.

use crate::connection::SendOutcome;
use crate::{ConnectionError, ConnectionResult};
use courier_protocol::{encode_frame, ErrorResponse, Message, ERROR_FRAME_LEN};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// One live binary-protocol session.
///
/// Generic over the stream so the protocol logic can be exercised against an
/// in-memory pipe; production uses a TLS stream over TCP.
pub struct BinaryConnection<S> {
    stream: S,
    select_timeout: Duration,
    open: bool,
}

impl<S> BinaryConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, select_timeout: Duration) -> Self {
        Self {
            stream,
            select_timeout,
            open: true,
        }
    }

    /// Whether the session is still usable for writes.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Write one notification frame, then watch the read side for the
    /// configured window.
    ///
    /// Outcomes:
    /// - `Accepted`: the window elapsed with no complaint. Optimistic: a
    ///   genuinely failed send whose error frame arrives after the window is
    ///   still reported as accepted. The window trades throughput against
    ///   that risk.
    /// - `Rejected`: the gateway named a failed message; the session is dead.
    /// - `Closed`: end-of-file with no frame; the session is dead and the
    ///   failure is unattributed.
    pub async fn send(&mut self, msg: &Message) -> ConnectionResult<SendOutcome> {
        if !self.open {
            return Err(ConnectionError::NotConnected);
        }

        let frame = encode_frame(msg)?;
        if let Err(e) = self.write_frame(&frame).await {
            self.open = false;
            return Err(e);
        }
        debug!(id = msg.id, bytes = frame.len(), "wrote notification frame");

        self.watch_for_error().await
    }

    async fn write_frame(&mut self, frame: &[u8]) -> ConnectionResult<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn watch_for_error(&mut self) -> ConnectionResult<SendOutcome> {
        let mut buf = [0u8; ERROR_FRAME_LEN];
        match tokio::time::timeout(self.select_timeout, self.stream.read_exact(&mut buf)).await {
            // Read side stayed quiet: the gateway had no complaint in time.
            Err(_elapsed) => Ok(SendOutcome::Accepted),
            Ok(Ok(_)) => {
                self.open = false;
                let err = ErrorResponse::decode(&buf)?;
                warn!(id = err.id, status = %err.status, "gateway rejected message");
                Ok(SendOutcome::Rejected(err))
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.open = false;
                warn!("gateway closed the connection without an error frame");
                Ok(SendOutcome::Closed)
            }
            Ok(Err(e)) => {
                self.open = false;
                Err(e.into())
            }
        }
    }

    /// Close the session. Returns false when it was already closed.
    pub async fn shutdown(&mut self) -> bool {
        if !self.open {
            return false;
        }
        self.open = false;
        let _ = self.stream.shutdown().await;
        true
    }
}
