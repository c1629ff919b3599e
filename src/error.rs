//! Top-level error type for the binary.

use crate::config::ConfigError;
use crate::mqtt::MqttError;
use crate::tuya::TuyaError;
use thiserror::Error;

/// Anything that can abort the bridge process. Per-tick failures never
/// reach this type; the loop absorbs them and tracks availability instead.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tuya API error: {0}")]
    Tuya(#[from] TuyaError),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
