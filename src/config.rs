//! Bridge configuration loaded from TOML with env-var credential
//! resolution.
//!
//! All values are supplied once at startup and immutable thereafter.
//! Secrets never live in the config file; the file names the environment
//! variables that hold them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    pub tuya: TuyaSection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub sensor: SensorSection,
    #[serde(default)]
    pub bridge: BridgeSection,
}

/// Tuya data-center region. Selects the OpenAPI base URL from a fixed set;
/// a typo'd region is a startup configuration error, not a silent default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Eu,
    Us,
    Cn,
    In,
}

impl Region {
    pub fn base_url(self) -> &'static str {
        match self {
            Region::Eu => "https://openapi.tuyaeu.com",
            Region::Us => "https://openapi.tuyaus.com",
            Region::Cn => "https://openapi.tuyacn.com",
            Region::In => "https://openapi.tuyain.com",
        }
    }
}

/// Tuya OpenAPI section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TuyaSection {
    /// Data-center region selecting the OpenAPI base URL
    pub region: Region,
    /// Environment variable containing the access id (client id)
    #[serde(default = "default_access_id_env")]
    pub access_id_env: String,
    /// Environment variable containing the access key (client secret)
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,
    /// Device whose shadow properties are polled
    pub device_id: String,
}

/// MQTT broker section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL with protocol and port (`mqtt://` or `mqtts://`)
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
}

/// How the bridged sensor presents itself downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorSection {
    /// Entity identifier used in topics and discovery unique ids
    /// (must match [a-zA-Z0-9._-]+)
    #[serde(default = "default_entity_id")]
    pub entity_id: String,
    /// Display name for the discovery payloads
    #[serde(default = "default_sensor_name")]
    pub name: String,
    /// Home Assistant device class for the contact sensor
    #[serde(default = "default_device_class")]
    pub device_class: String,
    /// Manufacturer shown in the discovery device block
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            entity_id: default_entity_id(),
            name: default_sensor_name(),
            device_class: default_device_class(),
            manufacturer: default_manufacturer(),
        }
    }
}

/// Poll cadence and liveness policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSection {
    /// Seconds between poll ticks (default: 20)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Seconds without a successful shadow read before the availability
    /// topic flips to offline (default: 300)
    #[serde(default = "default_offline_after")]
    pub offline_after_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            offline_after_secs: default_offline_after(),
        }
    }
}

fn default_access_id_env() -> String {
    "TUYA_ACCESS_ID".to_string()
}

fn default_access_key_env() -> String {
    "TUYA_ACCESS_KEY".to_string()
}

fn default_entity_id() -> String {
    "tuya_sensor".to_string()
}

fn default_sensor_name() -> String {
    "Tuya Sensor".to_string()
}

fn default_device_class() -> String {
    "opening".to_string()
}

fn default_manufacturer() -> String {
    "Tuya".to_string()
}

fn default_poll_interval() -> u64 {
    20
}

fn default_offline_after() -> u64 {
    300
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation; credential presence is checked separately so
    /// `config --show` works without secrets in the environment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tuya.device_id.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "tuya.device_id must not be empty".to_string(),
            ));
        }
        validate_entity_id(&self.sensor.entity_id)?;
        if self.bridge.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "bridge.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Tuya access id, required; missing means fail fast before the loop starts.
    pub fn tuya_access_id(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.tuya.access_id_env)
    }

    /// Tuya access key, required; missing means fail fast before the loop starts.
    pub fn tuya_access_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.tuya.access_key_env)
    }

    /// Get MQTT username from environment variable.
    pub fn mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable.
    pub fn mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }
}

/// Entity ids land in MQTT topic names, so restrict them the same way
/// topic segments are.
fn validate_entity_id(entity_id: &str) -> Result<(), ConfigError> {
    let valid_chars = entity_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if entity_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidConfig(format!(
            "Entity id '{entity_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

/// Truncate a credential for logging: a short prefix and nothing else.
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(8).collect();
    format!("{prefix}***")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[tuya]
region = "eu"
access_id_env = "MY_ACCESS_ID"
access_key_env = "MY_ACCESS_KEY"
device_id = "bf1234567890abcdef"

[mqtt]
broker_url = "mqtt://core-mosquitto:1883"
username_env = "MQTT_USER"
password_env = "MQTT_PASSWORD"

[sensor]
entity_id = "front_door"
name = "Front Door"
device_class = "door"

[bridge]
poll_interval_secs = 30
offline_after_secs = 600
"#;

        let config: BridgeConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.tuya.region, Region::Eu);
        assert_eq!(config.tuya.device_id, "bf1234567890abcdef");
        assert_eq!(config.tuya.access_id_env, "MY_ACCESS_ID");
        assert_eq!(config.mqtt.broker_url, "mqtt://core-mosquitto:1883");
        assert_eq!(config.sensor.entity_id, "front_door");
        assert_eq!(config.bridge.poll_interval_secs, 30);
        assert_eq!(config.bridge.offline_after_secs, 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_content = r#"
[tuya]
region = "us"
device_id = "dev1"

[mqtt]
broker_url = "mqtt://localhost:1883"
"#;

        let config: BridgeConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.tuya.access_id_env, "TUYA_ACCESS_ID");
        assert_eq!(config.tuya.access_key_env, "TUYA_ACCESS_KEY");
        assert_eq!(config.sensor.entity_id, "tuya_sensor");
        assert_eq!(config.sensor.name, "Tuya Sensor");
        assert_eq!(config.sensor.device_class, "opening");
        assert_eq!(config.sensor.manufacturer, "Tuya");
        assert_eq!(config.bridge.poll_interval_secs, 20);
        assert_eq!(config.bridge.offline_after_secs, 300);
        assert_eq!(config.mqtt.username_env, None);
    }

    #[test]
    fn test_region_base_urls() {
        assert_eq!(Region::Eu.base_url(), "https://openapi.tuyaeu.com");
        assert_eq!(Region::Us.base_url(), "https://openapi.tuyaus.com");
        assert_eq!(Region::Cn.base_url(), "https://openapi.tuyacn.com");
        assert_eq!(Region::In.base_url(), "https://openapi.tuyain.com");
    }

    #[test]
    fn test_unknown_region_rejected_at_parse() {
        let toml_content = r#"
[tuya]
region = "mars"
device_id = "dev1"

[mqtt]
broker_url = "mqtt://localhost:1883"
"#;
        let result: Result<BridgeConfig, _> = toml::from_str(toml_content);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_device_id_fails_validation() {
        let toml_content = r#"
[tuya]
region = "eu"
device_id = ""

[mqtt]
broker_url = "mqtt://localhost:1883"
"#;
        let config: BridgeConfig = toml::from_str(toml_content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_entity_id() {
        assert!(validate_entity_id("invalid@entity").is_err());
        assert!(validate_entity_id("").is_err());
        assert!(validate_entity_id("valid-entity_123.test").is_ok());
    }

    #[test]
    fn test_zero_poll_interval_fails_validation() {
        let toml_content = r#"
[tuya]
region = "eu"
device_id = "dev1"

[mqtt]
broker_url = "mqtt://localhost:1883"

[bridge]
poll_interval_secs = 0
"#;
        let config: BridgeConfig = toml::from_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redact_truncates() {
        assert_eq!(redact("abcdefghijklmnop"), "abcdefgh***");
        assert_eq!(redact("short"), "short***");
    }
}
