//! Message and device token types.

use crate::ProtocolError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Length of a device token in bytes.
pub const TOKEN_LEN: usize = 32;

/// Opaque identifier of the target device, as issued by the gateway.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceToken([u8; TOKEN_LEN]);

impl DeviceToken {
    /// Parse a token from its 64-character hex form.
    pub fn from_hex(s: &str) -> Result<Self, ProtocolError> {
        let bytes = hex::decode(s)?;
        Self::try_from(bytes.as_slice())
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for DeviceToken {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let arr: [u8; TOKEN_LEN] =
            bytes
                .try_into()
                .map_err(|_| ProtocolError::InvalidTokenLength {
                    expected: TOKEN_LEN,
                    got: bytes.len(),
                })?;
        Ok(Self(arr))
    }
}

impl FromStr for DeviceToken {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, ProtocolError> {
        Self::from_hex(s)
    }
}

impl std::fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceToken({})", self)
    }
}

impl Serialize for DeviceToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DeviceToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DeviceToken::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Delivery priority hint passed through to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Deliver immediately.
    Immediate,
    /// Deliver at a time that conserves the device's power.
    Conserve,
}

impl Priority {
    pub fn as_u8(self) -> u8 {
        match self {
            Priority::Immediate => 10,
            Priority::Conserve => 5,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            5 => Priority::Conserve,
            _ => Priority::Immediate,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Immediate
    }
}

/// A notification queued for delivery.
///
/// The sequence identifier is assigned locally and must be unique within a
/// connection's in-flight window; the binary protocol's error frames
/// correlate by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Locally-assigned, monotonically increasing identifier.
    pub id: u32,
    /// Target device.
    pub token: DeviceToken,
    /// Serialized payload bytes, already bounded by the protocol limit.
    pub payload: Vec<u8>,
    /// Expiry as epoch seconds; None means "deliver now or discard".
    pub expiry: Option<u32>,
    /// Delivery priority.
    pub priority: Priority,
    /// Times this message has been requeued after a transient failure.
    pub retry_count: u32,
}

impl Message {
    pub fn new(id: u32, token: DeviceToken, payload: Vec<u8>) -> Self {
        Self {
            id,
            token,
            payload,
            expiry: None,
            priority: Priority::default(),
            retry_count: 0,
        }
    }

    pub fn with_expiry(mut self, epoch_secs: u32) -> Self {
        self.expiry = Some(epoch_secs);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Monotonic sequence-identifier source for enqueued messages.
#[derive(Debug)]
pub struct Sequence {
    next: u32,
}

impl Sequence {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Test helper: a token with every byte set to `fill`.
#[cfg(test)]
pub(crate) fn test_token(fill: u8) -> DeviceToken {
    DeviceToken([fill; TOKEN_LEN])
}
