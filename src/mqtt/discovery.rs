//! Home Assistant MQTT discovery payloads.
//!
//! One retained config per managed value lets the platform auto-register
//! the contact sensor and its battery without manual configuration. The
//! content is static; it plays no part in the loop's runtime decisions.

use crate::config::SensorSection;
use crate::mqtt::topics::TopicBuilder;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Discovery config for the contact sensor (`binary_sensor` component).
#[derive(Debug, Clone, Serialize)]
pub struct BinarySensorConfig {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub availability_topic: String,
    pub device_class: String,
    pub payload_on: String,
    pub payload_off: String,
    pub device: DeviceInfo,
}

impl BinarySensorConfig {
    pub fn for_sensor(sensor: &SensorSection, device_id: &str) -> Self {
        Self {
            name: sensor.name.clone(),
            unique_id: sensor.entity_id.clone(),
            state_topic: TopicBuilder::state(&sensor.entity_id),
            availability_topic: TopicBuilder::availability(&sensor.entity_id),
            device_class: sensor.device_class.clone(),
            payload_on: "ON".to_string(),
            payload_off: "OFF".to_string(),
            device: DeviceInfo {
                identifiers: vec![device_id.to_string()],
                manufacturer: Some(sensor.manufacturer.clone()),
                name: Some(sensor.name.clone()),
                model: Some("Cloud".to_string()),
            },
        }
    }
}

/// Discovery config for the battery diagnostic (`sensor` component).
#[derive(Debug, Clone, Serialize)]
pub struct BatterySensorConfig {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub availability_topic: String,
    pub unit_of_measurement: String,
    pub device_class: String,
    pub entity_category: String,
    pub device: DeviceInfo,
}

impl BatterySensorConfig {
    pub fn for_sensor(sensor: &SensorSection, device_id: &str) -> Self {
        Self {
            name: format!("{} Battery", sensor.name),
            unique_id: format!("{}_battery", sensor.entity_id),
            state_topic: TopicBuilder::battery(&sensor.entity_id),
            availability_topic: TopicBuilder::availability(&sensor.entity_id),
            unit_of_measurement: "%".to_string(),
            device_class: "battery".to_string(),
            entity_category: "diagnostic".to_string(),
            device: DeviceInfo {
                identifiers: vec![device_id.to_string()],
                manufacturer: None,
                name: None,
                model: None,
            },
        }
    }
}
