//! Notification payload assembly.

use crate::ProtocolError;
use serde_json::{json, Map, Value};

/// Payload byte limit on the binary protocol.
pub const BINARY_PAYLOAD_LIMIT: usize = 2048;

/// Payload byte limit on the request-based protocol.
pub const REQUEST_PAYLOAD_LIMIT: usize = 4096;

/// JSON notification body.
///
/// Thin assembly layer: the gateway interprets the `aps` dictionary, custom
/// keys ride alongside it at the top level.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    alert: Option<String>,
    badge: Option<u32>,
    sound: Option<String>,
    custom: Map<String, Value>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alert(mut self, text: impl Into<String>) -> Self {
        self.alert = Some(text.into());
        self
    }

    pub fn with_badge(mut self, count: u32) -> Self {
        self.badge = Some(count);
        self
    }

    pub fn with_sound(mut self, name: impl Into<String>) -> Self {
        self.sound = Some(name.into());
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    /// Serialize the payload, enforcing the protocol's byte limit.
    pub fn to_bytes(&self, limit: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut aps = Map::new();
        if let Some(alert) = &self.alert {
            aps.insert("alert".into(), json!(alert));
        }
        if let Some(badge) = self.badge {
            aps.insert("badge".into(), json!(badge));
        }
        if let Some(sound) = &self.sound {
            aps.insert("sound".into(), json!(sound));
        }

        let mut body = Map::new();
        body.insert("aps".into(), Value::Object(aps));
        for (k, v) in &self.custom {
            body.insert(k.clone(), v.clone());
        }

        let bytes = serde_json::to_vec(&Value::Object(body))?;
        if bytes.len() > limit {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                limit,
            });
        }
        Ok(bytes)
    }
}
