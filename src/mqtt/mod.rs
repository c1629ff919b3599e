//! MQTT publishing: retained state topics, availability and Home
//! Assistant discovery.

pub mod client;
pub mod discovery;
pub mod topics;

pub use client::{configure_mqtt_options, MqttError, MqttPublisher};
pub use discovery::{BatterySensorConfig, BinarySensorConfig, DeviceInfo};
pub use topics::TopicBuilder;

use crate::bridge::Availability;
use async_trait::async_trait;

/// Downstream seam the bridge loop publishes through. Publishes are
/// fire-and-forget from the loop's perspective; retained delivery and
/// deduplication are the broker's concern.
#[async_trait]
pub trait StatePublisher: Send + Sync {
    /// One-time retained discovery configs for both managed values.
    async fn publish_discovery(&self) -> Result<(), MqttError>;
    /// Retained availability payload (`online` / `offline`).
    async fn publish_availability(&self, availability: Availability) -> Result<(), MqttError>;
    /// Retained contact payload (`ON` / `OFF`).
    async fn publish_contact(&self, payload: &str) -> Result<(), MqttError>;
    /// Retained battery payload (bare integer string).
    async fn publish_battery(&self, payload: &str) -> Result<(), MqttError>;
}
