//! Top-level error type for the bridge binary
//!
//! Each module owns its error enum; this module aggregates the ones that
//! can abort startup before the relays are acquired. Payload problems never
//! reach this type: the dispatcher logs and counts them, and failures once
//! the lifecycle is running end in a `ShutdownReason` instead.

use crate::config::ConfigError;
use crate::gpio::raspberry_pi::RppalGpioError;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Main error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("GPIO unavailable: {0}")]
    GpioUnavailable(#[from] RppalGpioError),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_and_display() {
        let error: BridgeError = ConfigError::MissingBroker("MQTT_BROKER_HOST".to_string()).into();
        assert!(matches!(error, BridgeError::Config(_)));
        assert!(error.to_string().contains("MQTT_BROKER_HOST"));

        let error: BridgeError = MqttError::InvalidBrokerUrl("ftp://x".to_string()).into();
        assert!(matches!(error, BridgeError::Mqtt(_)));
        assert!(error.to_string().contains("ftp://x"));
    }
}
