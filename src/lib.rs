//! Tuya cloud to MQTT bridge for a contact sensor.
//!
//! Polls a device's shadow properties from the Tuya OpenAPI and republishes
//! contact state, battery level and availability to retained MQTT topics,
//! with Home Assistant discovery so the sensor registers itself.
//!
//! The crate is split along the two seams of the poll loop:
//!
//! - [`tuya`] holds the signed HTTP client and its request canonicalization
//! - [`extract`] maps raw shadow properties to a typed reading
//! - [`bridge`] holds the loop and the availability state machine
//! - [`mqtt`] holds the publisher, topics and discovery payloads

pub mod bridge;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod mqtt;
pub mod testing;
pub mod tuya;

pub use bridge::{Availability, AvailabilityTracker, BridgeLoop, ShadowSource};
pub use config::{BridgeConfig, ConfigError, Region};
pub use error::{BridgeError, BridgeResult};
pub use extract::{extract, PropertySnapshot, Reading};
pub use mqtt::{MqttError, MqttPublisher, StatePublisher};
pub use tuya::{TuyaClient, TuyaError, TuyaShadowSource};
