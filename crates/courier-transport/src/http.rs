//! Stateless request-based connection.
//!
//! One HTTP request per message; the response status is a synchronous
//! verdict, so no identifier correlation is needed — the single outstanding
//! message is the one the response refers to.

use crate::connection::SendOutcome;
use crate::token::ProviderToken;
use crate::ConnectionResult;
use courier_protocol::{Message, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Authentication mode for request-based sends.
pub(crate) enum RequestAuth {
    /// ES256-signed bearer token, refreshed when it ages out.
    Token(ProviderToken),
    /// Client certificate presented during the TLS handshake.
    Certificate,
}

/// JSON error body returned alongside a non-200 status.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    reason: Option<String>,
}

/// One live request-based session.
pub struct RequestConnection {
    client: reqwest::Client,
    base_url: Url,
    topic: Option<String>,
    auth: RequestAuth,
    open: bool,
}

impl RequestConnection {
    pub(crate) fn new(
        client: reqwest::Client,
        base_url: Url,
        topic: Option<String>,
        auth: RequestAuth,
    ) -> Self {
        Self {
            client,
            base_url,
            topic,
            auth,
            open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Deliver one message and interpret the synchronous verdict.
    ///
    /// 200 is delivered; 4xx is a permanent per-message failure with the
    /// body's reason mapped onto the status taxonomy; 5xx is transient.
    pub async fn send(&mut self, msg: &Message) -> ConnectionResult<SendOutcome> {
        if !self.open {
            return Err(crate::ConnectionError::NotConnected);
        }

        let url = self
            .base_url
            .join(&format!("3/device/{}", msg.token))
            .map_err(|e| crate::ConnectionError::InvalidEndpoint(e.to_string()))?;

        let mut request = self
            .client
            .post(url)
            .header("apns-expiration", msg.expiry.unwrap_or(0))
            .header("apns-priority", u32::from(msg.priority.as_u8()))
            .body(msg.payload.clone());
        if let Some(topic) = &self.topic {
            request = request.header("apns-topic", topic);
        }
        if let RequestAuth::Token(token) = &mut self.auth {
            let now = chrono::Utc::now().timestamp();
            request = request.header("authorization", format!("bearer {}", token.bearer(now)?));
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(id = msg.id, status = status.as_u16(), "request sent");

        if status.is_success() {
            return Ok(SendOutcome::Delivered);
        }

        let reason = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.reason);
        let code = match &reason {
            Some(r) => StatusCode::from_reason(r),
            None => StatusCode::Unknown,
        };
        Ok(SendOutcome::Failed {
            status: code,
            permanent: status.is_client_error() && code.is_permanent(),
        })
    }

    /// Close the session. Returns false when it was already closed.
    pub fn shutdown(&mut self) -> bool {
        if !self.open {
            return false;
        }
        self.open = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use courier_protocol::{DeviceToken, TOKEN_LEN};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn msg(id: u32) -> Message {
        let token = DeviceToken::try_from(&[0x42u8; TOKEN_LEN][..]).unwrap();
        Message::new(id, token, br#"{"aps":{"alert":"hi"}}"#.to_vec())
    }

    /// Minimal HTTP/1.1 server answering one request with a fixed response.
    fn serve_responses(
        listener: TcpListener,
        status_line: &'static str,
        body: &'static str,
    ) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 16 * 1024];
                let mut total = 0;
                loop {
                    let n = match socket.read(&mut buf[total..]).await {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(_) => break,
                    };
                    total += n;
                    let text = String::from_utf8_lossy(&buf[..total]).to_string();
                    if let Some(header_end) = text.find("\r\n\r\n") {
                        let content_length = text
                            .lines()
                            .find_map(|l| {
                                let l = l.to_ascii_lowercase();
                                l.strip_prefix("content-length:")
                                    .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                            })
                            .unwrap_or(0);
                        if total >= header_end + 4 + content_length {
                            seen.push(text);
                            let response = format!(
                                "{status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                                body.len()
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            break;
                        }
                    }
                }
                if seen.len() >= 1 {
                    break;
                }
            }
            seen
        })
    }

    fn connection(base: &str) -> RequestConnection {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let token = ProviderToken::new(fixtures::signing_key(), "TEAM123", "KEY123", 3300);
        RequestConnection::new(
            client,
            Url::parse(base).unwrap(),
            Some("com.example.app".into()),
            RequestAuth::Token(token),
        )
    }

    #[tokio::test]
    async fn test_accepted_response_is_delivered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = serve_responses(listener, "HTTP/1.1 200 OK", "");

        let mut conn = connection(&base);
        let outcome = conn.send(&msg(1)).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Delivered));

        let seen = server.await.unwrap();
        let request = &seen[0];
        // Path carries the device token; headers carry auth and routing
        assert!(request.starts_with(&format!("POST /3/device/{} ", "42".repeat(TOKEN_LEN))));
        assert!(request.contains("authorization: bearer "));
        assert!(request.contains("apns-topic: com.example.app"));
        assert!(request.contains("apns-priority: 10"));
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = serve_responses(
            listener,
            "HTTP/1.1 400 Bad Request",
            r#"{"reason":"BadDeviceToken"}"#,
        );

        let mut conn = connection(&base);
        let outcome = conn.send(&msg(2)).await.unwrap();
        match outcome {
            SendOutcome::Failed { status, permanent } => {
                assert_eq!(status, StatusCode::InvalidToken);
                assert!(permanent);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = serve_responses(
            listener,
            "HTTP/1.1 503 Service Unavailable",
            r#"{"reason":"ServiceUnavailable"}"#,
        );

        let mut conn = connection(&base);
        let outcome = conn.send(&msg(3)).await.unwrap();
        match outcome {
            SendOutcome::Failed { status, permanent } => {
                assert_eq!(status, StatusCode::Shutdown);
                assert!(!permanent);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let mut conn = connection(&base);
        assert!(matches!(
            conn.send(&msg(4)).await,
            Err(crate::ConnectionError::Http(_))
        ));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let client = reqwest::Client::new();
        let token = ProviderToken::new(fixtures::signing_key(), "T", "K", 3300);
        let mut conn = RequestConnection::new(
            client,
            Url::parse("https://api.push.apple.com").unwrap(),
            None,
            RequestAuth::Token(token),
        );
        assert!(conn.shutdown());
        assert!(!conn.shutdown());
    }
}
