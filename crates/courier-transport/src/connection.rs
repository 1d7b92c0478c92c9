//! Connection establishment and lifecycle.

use crate::binary::BinaryConnection;
use crate::http::{RequestAuth, RequestConnection};
use crate::token::ProviderToken;
use crate::{ConnectionError, ConnectionResult};
use courier_config::{Config, ConfigError, ConfigResult, Credentials, Protocol};
use courier_protocol::{ErrorResponse, Message, StatusCode};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsConnector;
use tracing::{info, warn};
use url::Url;

/// Verdict of one send on the active transport.
#[derive(Debug)]
pub enum SendOutcome {
    /// Binary: the error window elapsed with no complaint (optimistic).
    Accepted,
    /// Request: the gateway confirmed delivery synchronously.
    Delivered,
    /// Binary: the gateway named a rejected message; the session is dead.
    Rejected(ErrorResponse),
    /// Binary: end-of-file with no error frame; the session is dead.
    Closed,
    /// Request: per-message failure with its classification.
    Failed { status: StatusCode, permanent: bool },
}

/// A live connection over whichever protocol was configured.
///
/// The variant set is closed: the protocol is chosen once, at construction,
/// and a connection is owned by exactly one delivery engine.
pub enum Connection {
    Binary(BinaryConnection<TlsStream<TcpStream>>),
    Request(RequestConnection),
}

impl Connection {
    /// Send one message on the active transport.
    pub async fn send(&mut self, msg: &Message) -> ConnectionResult<SendOutcome> {
        match self {
            Connection::Binary(conn) => conn.send(msg).await,
            Connection::Request(conn) => conn.send(msg).await,
        }
    }

    /// Release the transport handle. Idempotent: closing an already-closed
    /// connection is a no-op returning false.
    pub async fn disconnect(&mut self) -> bool {
        let closed = match self {
            Connection::Binary(conn) => conn.shutdown().await,
            Connection::Request(conn) => conn.shutdown(),
        };
        if closed {
            info!("disconnected from gateway");
        }
        closed
    }

    pub fn is_open(&self) -> bool {
        match self {
            Connection::Binary(conn) => conn.is_open(),
            Connection::Request(conn) => conn.is_open(),
        }
    }
}

/// Builds connections for one worker, retrying with a bounded backoff.
///
/// Construction validates configuration and credential material; connect-time
/// failures are only ever transport-level.
pub struct ConnectionManager {
    config: Arc<Config>,
    credentials: Arc<Credentials>,
    tls: Arc<ClientConfig>,
}

impl ConnectionManager {
    /// Validate configuration and assemble the TLS client state.
    ///
    /// Fails with `ConfigError` on invalid environment/protocol values or
    /// unusable credential material; never touches the network.
    pub fn new(config: Arc<Config>, credentials: Arc<Credentials>) -> ConfigResult<Self> {
        config.validate()?;

        let builder = ClientConfig::builder().with_root_certificates(credentials.roots.clone());
        let tls = if credentials.cert_chain.is_empty() {
            builder.with_no_client_auth()
        } else {
            let key = credentials
                .private_key
                .as_ref()
                .ok_or_else(|| ConfigError::Credential("certificate without private key".into()))?
                .clone_key();
            builder
                .with_client_auth_cert(credentials.cert_chain.clone(), key)
                .map_err(|e| ConfigError::Tls(e.to_string()))?
        };

        Ok(Self {
            config,
            credentials,
            tls: Arc::new(tls),
        })
    }

    /// Establish a connection, retrying the protocol-specific connect up to
    /// the configured count and surfacing the last error after exhaustion.
    pub async fn connect(&self) -> ConnectionResult<Connection> {
        let attempts = self.config.connect_retry_count + 1;
        let mut last: Option<ConnectionError> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.connect_retry_interval()).await;
            }
            info!(attempt, protocol = %self.config.protocol, "connecting to gateway");
            match self.try_connect().await {
                Ok(conn) => {
                    info!(attempt, environment = %self.config.environment, "connected");
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "connect attempt failed");
                    last = Some(e);
                }
            }
        }

        let last = last
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        Err(ConnectionError::Exhausted { attempts, last })
    }

    async fn try_connect(&self) -> ConnectionResult<Connection> {
        match self.config.protocol {
            Protocol::Binary => {
                let endpoint = self.config.binary_endpoint();
                let stream = self.open_tls(&endpoint).await?;
                Ok(Connection::Binary(BinaryConnection::new(
                    stream,
                    self.config.select_timeout(),
                )))
            }
            Protocol::Request => {
                let base_url = Url::parse(&self.config.request_endpoint())
                    .map_err(|e| ConnectionError::InvalidEndpoint(e.to_string()))?;

                let mut builder = reqwest::Client::builder()
                    .timeout(self.config.connect_timeout())
                    .use_rustls_tls();
                let auth = if self.config.uses_token_auth() {
                    let token = self.provider_token()?;
                    RequestAuth::Token(token)
                } else {
                    let pem = self.credentials.identity_pem.as_deref().ok_or_else(|| {
                        ConnectionError::InvalidEndpoint(
                            "certificate auth configured without certificate".into(),
                        )
                    })?;
                    builder = builder.identity(reqwest::Identity::from_pem(pem)?);
                    RequestAuth::Certificate
                };
                let client = builder.build()?;
                Ok(Connection::Request(RequestConnection::new(
                    client,
                    base_url,
                    self.config.topic.clone(),
                    auth,
                )))
            }
        }
    }

    fn provider_token(&self) -> ConnectionResult<ProviderToken> {
        let signing_key = self.credentials.signing_key.clone().ok_or_else(|| {
            ConnectionError::InvalidEndpoint("token auth configured without signing key".into())
        })?;
        let team_id = self.config.team_id.clone().unwrap_or_default();
        let key_id = self.config.key_id.clone().unwrap_or_default();
        Ok(ProviderToken::new(
            signing_key,
            team_id,
            key_id,
            self.config.token_lifetime_secs,
        ))
    }

    /// TCP connect (bounded by the connect timeout) followed by a TLS
    /// handshake against `endpoint` ("host:port").
    pub(crate) async fn open_tls(&self, endpoint: &str) -> ConnectionResult<TlsStream<TcpStream>> {
        let host = endpoint
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .ok_or_else(|| ConnectionError::InvalidEndpoint(endpoint.to_string()))?;

        let tcp = tokio::time::timeout(self.config.connect_timeout(), TcpStream::connect(endpoint))
            .await
            .map_err(|_| ConnectionError::Timeout)??;

        let connector = TlsConnector::from(self.tls.clone());
        let server_name = ServerName::try_from(host)?;
        let stream = tokio::time::timeout(
            self.config.connect_timeout(),
            connector.connect(server_name, tcp),
        )
        .await
        .map_err(|_| ConnectionError::Timeout)??;

        Ok(stream)
    }
}
