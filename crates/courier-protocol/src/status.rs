//! Gateway status codes and their permanent/transient classification.

/// Status byte carried by the binary protocol's error frame, also used to
/// classify request-protocol rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    NoError,
    ProcessingError,
    MissingToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidPayloadSize,
    InvalidToken,
    Shutdown,
    Unknown,
}

impl StatusCode {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => StatusCode::NoError,
            1 => StatusCode::ProcessingError,
            2 => StatusCode::MissingToken,
            3 => StatusCode::MissingTopic,
            4 => StatusCode::MissingPayload,
            5 => StatusCode::InvalidTokenSize,
            7 => StatusCode::InvalidPayloadSize,
            8 => StatusCode::InvalidToken,
            10 => StatusCode::Shutdown,
            _ => StatusCode::Unknown,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            StatusCode::NoError => 0,
            StatusCode::ProcessingError => 1,
            StatusCode::MissingToken => 2,
            StatusCode::MissingTopic => 3,
            StatusCode::MissingPayload => 4,
            StatusCode::InvalidTokenSize => 5,
            StatusCode::InvalidPayloadSize => 7,
            StatusCode::InvalidToken => 8,
            StatusCode::Shutdown => 10,
            StatusCode::Unknown => 255,
        }
    }

    /// Classify a request-protocol rejection reason onto the same taxonomy.
    pub fn from_reason(reason: &str) -> Self {
        match reason {
            "BadDeviceToken" | "DeviceTokenNotForTopic" | "Unregistered" => {
                StatusCode::InvalidToken
            }
            "MissingDeviceToken" => StatusCode::MissingToken,
            "MissingTopic" | "TopicDisallowed" | "BadTopic" => StatusCode::MissingTopic,
            "PayloadEmpty" => StatusCode::MissingPayload,
            "PayloadTooLarge" => StatusCode::InvalidPayloadSize,
            "BadDeviceTokenSize" => StatusCode::InvalidTokenSize,
            "ServiceUnavailable" | "Shutdown" => StatusCode::Shutdown,
            "InternalServerError" | "TooManyRequests" => StatusCode::ProcessingError,
            _ => StatusCode::Unknown,
        }
    }

    /// A permanent failure: retrying the same message cannot succeed.
    pub fn is_permanent(self) -> bool {
        matches!(
            self,
            StatusCode::MissingToken
                | StatusCode::MissingTopic
                | StatusCode::MissingPayload
                | StatusCode::InvalidTokenSize
                | StatusCode::InvalidPayloadSize
                | StatusCode::InvalidToken
        )
    }

    /// A transient failure: the message may be requeued.
    pub fn is_transient(self) -> bool {
        !self.is_permanent() && self != StatusCode::NoError
    }

    fn description(self) -> &'static str {
        match self {
            StatusCode::NoError => "no error",
            StatusCode::ProcessingError => "processing error",
            StatusCode::MissingToken => "missing device token",
            StatusCode::MissingTopic => "missing topic",
            StatusCode::MissingPayload => "missing payload",
            StatusCode::InvalidTokenSize => "invalid token size",
            StatusCode::InvalidPayloadSize => "invalid payload size",
            StatusCode::InvalidToken => "invalid token",
            StatusCode::Shutdown => "gateway shutdown",
            StatusCode::Unknown => "unknown error",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_byte_roundtrip() {
        for v in [0u8, 1, 2, 3, 4, 5, 7, 8, 10, 255] {
            assert_eq!(StatusCode::from_u8(v).as_u8(), v);
        }
    }

    #[test]
    fn test_unassigned_bytes_map_to_unknown() {
        assert_eq!(StatusCode::from_u8(6), StatusCode::Unknown);
        assert_eq!(StatusCode::from_u8(9), StatusCode::Unknown);
        assert_eq!(StatusCode::from_u8(42), StatusCode::Unknown);
    }

    #[test]
    fn test_classification() {
        // Permanent: retrying cannot help
        for s in [
            StatusCode::MissingToken,
            StatusCode::MissingTopic,
            StatusCode::MissingPayload,
            StatusCode::InvalidTokenSize,
            StatusCode::InvalidPayloadSize,
            StatusCode::InvalidToken,
        ] {
            assert!(s.is_permanent(), "{s} should be permanent");
            assert!(!s.is_transient());
        }
        // Transient: retrying may succeed
        for s in [
            StatusCode::ProcessingError,
            StatusCode::Shutdown,
            StatusCode::Unknown,
        ] {
            assert!(s.is_transient(), "{s} should be transient");
            assert!(!s.is_permanent());
        }
        assert!(!StatusCode::NoError.is_permanent());
        assert!(!StatusCode::NoError.is_transient());
    }

    #[test]
    fn test_reason_mapping() {
        assert_eq!(
            StatusCode::from_reason("BadDeviceToken"),
            StatusCode::InvalidToken
        );
        assert_eq!(
            StatusCode::from_reason("PayloadTooLarge"),
            StatusCode::InvalidPayloadSize
        );
        assert_eq!(
            StatusCode::from_reason("ServiceUnavailable"),
            StatusCode::Shutdown
        );
        assert_eq!(
            StatusCode::from_reason("SomethingNew"),
            StatusCode::Unknown
        );
    }
}
