//! Daemon configuration.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default pacing delay between consecutive binary frame writes, in microseconds.
pub const DEFAULT_WRITE_INTERVAL_US: u64 = 10_000;

/// Default window the binary transport waits for an error frame after a write,
/// in microseconds.
pub const DEFAULT_SELECT_TIMEOUT_US: u64 = 1_000_000;

/// Default timeout for a single connect attempt, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default number of connect retries after the initial attempt.
pub const DEFAULT_CONNECT_RETRY_COUNT: u32 = 3;

/// Default pause between connect attempts, in microseconds.
pub const DEFAULT_CONNECT_RETRY_INTERVAL_US: u64 = 1_000_000;

/// Default per-message retry ceiling before a transient failure is dropped.
pub const DEFAULT_RETRY_CEILING: u32 = 3;

/// Default maximum number of queued messages.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 2;

/// Default grace period granted to in-flight sends at shutdown, in seconds.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 10;

/// Default provider-token lifetime before re-signing, in seconds (55 minutes;
/// the gateway rejects tokens older than an hour).
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3_300;

/// Target gateway environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    /// host:port of the binary-protocol gateway for this environment.
    pub fn binary_gateway(&self) -> &'static str {
        match self {
            Environment::Production => "gateway.push.apple.com:2195",
            Environment::Sandbox => "gateway.sandbox.push.apple.com:2195",
        }
    }

    /// host:port of the feedback service for this environment.
    pub fn feedback_gateway(&self) -> &'static str {
        match self {
            Environment::Production => "feedback.push.apple.com:2196",
            Environment::Sandbox => "feedback.sandbox.push.apple.com:2196",
        }
    }

    /// Base URL of the request-based gateway for this environment.
    pub fn request_gateway(&self) -> &'static str {
        match self {
            Environment::Production => "https://api.push.apple.com",
            Environment::Sandbox => "https://api.sandbox.push.apple.com",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "production" => Ok(Environment::Production),
            "sandbox" => Ok(Environment::Sandbox),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Sandbox => write!(f, "sandbox"),
        }
    }
}

/// Wire protocol used to reach the gateway. The two are mutually exclusive;
/// the choice is made once, when a connection is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Persistent framed protocol over a long-lived TLS socket.
    Binary,
    /// Stateless per-message protocol over HTTP/2.
    Request,
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "binary" => Ok(Protocol::Binary),
            "request" => Ok(Protocol::Request),
            other => Err(ConfigError::InvalidProtocol(other.to_string())),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Binary => write!(f, "binary"),
            Protocol::Request => write!(f, "request"),
        }
    }
}

/// Main daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target environment.
    pub environment: Environment,
    /// Wire protocol.
    pub protocol: Protocol,

    /// Client certificate chain, PEM. Required for the binary protocol and
    /// for certificate-authenticated request sends.
    #[serde(default)]
    pub certificate: Option<PathBuf>,
    /// Client private key, PEM. Falls back to the certificate file when the
    /// PEM bundles both.
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    /// Passphrase for an encrypted PKCS#8 signing key.
    #[serde(default)]
    pub passphrase: Option<String>,
    /// ES256 signing key (PKCS#8 PEM) for provider-token authentication.
    #[serde(default)]
    pub signing_key: Option<PathBuf>,
    /// Team identifier, the `iss` claim of the provider token.
    #[serde(default)]
    pub team_id: Option<String>,
    /// Key identifier, the `kid` header of the provider token.
    #[serde(default)]
    pub key_id: Option<String>,
    /// Notification topic attached to request-based sends.
    #[serde(default)]
    pub topic: Option<String>,
    /// Extra root authority bundle, PEM, appended to the built-in roots.
    #[serde(default)]
    pub root_ca: Option<PathBuf>,

    /// Override for the binary gateway endpoint (host:port).
    #[serde(default)]
    pub binary_gateway: Option<String>,
    /// Override for the feedback endpoint (host:port).
    #[serde(default)]
    pub feedback_gateway: Option<String>,
    /// Override for the request-based gateway base URL.
    #[serde(default)]
    pub request_gateway: Option<String>,

    /// Pacing delay between consecutive binary writes, µs.
    #[serde(default = "default_write_interval_us")]
    pub write_interval_us: u64,
    /// How long to wait for an error frame after a binary write, µs.
    #[serde(default = "default_select_timeout_us")]
    pub select_timeout_us: u64,
    /// Timeout for one connect attempt, seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Number of connect retries after the initial attempt.
    #[serde(default = "default_connect_retry_count")]
    pub connect_retry_count: u32,
    /// Pause between connect attempts, µs.
    #[serde(default = "default_connect_retry_interval_us")]
    pub connect_retry_interval_us: u64,

    /// Per-message retry ceiling for transient failures.
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,
    /// Maximum number of queued messages.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of delivery workers draining the shared queue.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Grace period for in-flight sends at shutdown, seconds.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Provider-token lifetime before re-signing, seconds.
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: i64,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_write_interval_us() -> u64 {
    DEFAULT_WRITE_INTERVAL_US
}

fn default_select_timeout_us() -> u64 {
    DEFAULT_SELECT_TIMEOUT_US
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_connect_retry_count() -> u32 {
    DEFAULT_CONNECT_RETRY_COUNT
}

fn default_connect_retry_interval_us() -> u64 {
    DEFAULT_CONNECT_RETRY_INTERVAL_US
}

fn default_retry_ceiling() -> u32 {
    DEFAULT_RETRY_CEILING
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_grace_period_secs() -> u64 {
    DEFAULT_GRACE_PERIOD_SECS
}

fn default_token_lifetime_secs() -> i64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Sandbox,
            protocol: Protocol::Binary,
            certificate: None,
            private_key: None,
            passphrase: None,
            signing_key: None,
            team_id: None,
            key_id: None,
            topic: None,
            root_ca: None,
            binary_gateway: None,
            feedback_gateway: None,
            request_gateway: None,
            write_interval_us: DEFAULT_WRITE_INTERVAL_US,
            select_timeout_us: DEFAULT_SELECT_TIMEOUT_US,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            connect_retry_count: DEFAULT_CONNECT_RETRY_COUNT,
            connect_retry_interval_us: DEFAULT_CONNECT_RETRY_INTERVAL_US,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: DEFAULT_WORKERS,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, then apply environment overrides.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.load_from_env();
        Ok(config)
    }

    /// Override configuration from environment variables. Only the log level
    /// can be overridden at runtime.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("COURIER_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Validate the configuration for the selected protocol.
    ///
    /// Called by consumers at construction time so that bad credentials or
    /// nonsensical values fail before any connect is attempted.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.token_lifetime_secs <= 0 {
            return Err(ConfigError::Invalid(
                "token_lifetime_secs must be positive".into(),
            ));
        }

        match self.protocol {
            Protocol::Binary => {
                let cert = self.certificate.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("binary protocol requires a certificate".into())
                })?;
                require_readable(cert)?;
                if let Some(key) = &self.private_key {
                    require_readable(key)?;
                }
            }
            Protocol::Request => {
                if let (Some(_), Some(_), Some(key)) =
                    (&self.team_id, &self.key_id, &self.signing_key)
                {
                    require_readable(key)?;
                } else if let Some(cert) = &self.certificate {
                    require_readable(cert)?;
                } else {
                    return Err(ConfigError::Invalid(
                        "request protocol requires team_id/key_id/signing_key or a certificate"
                            .into(),
                    ));
                }
                if let Some(base) = &self.request_gateway {
                    url::Url::parse(base)?;
                }
            }
        }

        if let Some(ca) = &self.root_ca {
            require_readable(ca)?;
        }

        Ok(())
    }

    /// True when the request protocol should authenticate with a signed
    /// provider token rather than a client certificate.
    pub fn uses_token_auth(&self) -> bool {
        self.team_id.is_some() && self.key_id.is_some() && self.signing_key.is_some()
    }

    /// Resolved binary gateway endpoint.
    pub fn binary_endpoint(&self) -> String {
        self.binary_gateway
            .clone()
            .unwrap_or_else(|| self.environment.binary_gateway().to_string())
    }

    /// Resolved feedback endpoint.
    pub fn feedback_endpoint(&self) -> String {
        self.feedback_gateway
            .clone()
            .unwrap_or_else(|| self.environment.feedback_gateway().to_string())
    }

    /// Resolved request-based gateway base URL.
    pub fn request_endpoint(&self) -> String {
        self.request_gateway
            .clone()
            .unwrap_or_else(|| self.environment.request_gateway().to_string())
    }

    pub fn write_interval(&self) -> Duration {
        Duration::from_micros(self.write_interval_us)
    }

    pub fn select_timeout(&self) -> Duration {
        Duration::from_micros(self.select_timeout_us)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn connect_retry_interval(&self) -> Duration {
        Duration::from_micros(self.connect_retry_interval_us)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

fn require_readable(path: &Path) -> ConfigResult<()> {
    if !path.is_file() {
        return Err(ConfigError::Credential(format!(
            "credential file not found: {}",
            path.display()
        )));
    }
    std::fs::File::open(path).map_err(|e| {
        ConfigError::Credential(format!("credential file unreadable: {}: {}", path.display(), e))
    })?;
    Ok(())
}
