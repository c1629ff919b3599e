//! rumqttc-backed publisher with last-will availability.
//!
//! The bridge only ever publishes; there are no subscriptions. A single
//! background task drives the event loop. rumqttc reconnects on the next
//! poll after an error, so the driver only logs and backs off.

use crate::bridge::Availability;
use crate::config::{BridgeConfig, MqttSection, SensorSection};
use crate::mqtt::discovery::{BatterySensorConfig, BinarySensorConfig};
use crate::mqtt::topics::TopicBuilder;
use crate::mqtt::StatePublisher;
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::LastWill;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, MqttOptions};
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// MQTT transport errors.
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Serialization error")]
    SerializationError(#[source] serde_json::Error),
}

/// Build broker options: URL parsing, TLS for `mqtts://`, env credentials,
/// and the retained `offline` last will on the availability topic. The
/// last will announces an unclean exit at the connection level,
/// independent of the loop's own availability publishes.
pub fn configure_mqtt_options(
    config: &MqttSection,
    entity_id: &str,
) -> Result<MqttOptions, MqttError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| MqttError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    // Unique client id per connection attempt to avoid broker session clashes
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let client_id = format!("tuya-bridge-{entity_id}-{millis}");
    let mut options = MqttOptions::new(client_id, host, port);

    if url.scheme() == "mqtts" {
        options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(username_env) = &config.username_env {
        if let Ok(username) = std::env::var(username_env) {
            let password = config
                .password_env
                .as_ref()
                .and_then(|env_name| std::env::var(env_name).ok())
                .unwrap_or_default();
            options.set_credentials(&username, &password);
        }
    }

    options.set_keep_alive(Duration::from_secs(60));

    let lwt = LastWill::new(
        TopicBuilder::availability(entity_id),
        Availability::Offline.payload(),
        QoS::AtLeastOnce,
        true,
        None,
    );
    options.set_last_will(lwt);

    Ok(options)
}

/// Retained-topic publisher for the bridged sensor.
pub struct MqttPublisher {
    client: AsyncClient,
    sensor: SensorSection,
    device_id: String,
    event_loop_handle: Option<JoinHandle<()>>,
}

impl MqttPublisher {
    /// Connect to the broker and spawn the event-loop driver.
    pub async fn connect(config: &BridgeConfig) -> Result<Self, MqttError> {
        let options = configure_mqtt_options(&config.mqtt, &config.sensor.entity_id)?;
        let (client, mut event_loop) = AsyncClient::new(options, 10);

        let broker = config.mqtt.broker_url.clone();
        let handle = tokio::spawn(async move {
            info!(broker = %broker, "MQTT event loop started");
            loop {
                match event_loop.poll().await {
                    Ok(event) => {
                        debug!(target: "mqtt_transport", ?event, "MQTT event");
                    }
                    Err(e) => {
                        warn!(target: "mqtt_transport", error = %e, "MQTT connection error; retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self {
            client,
            sensor: config.sensor.clone(),
            device_id: config.tuya.device_id.clone(),
            event_loop_handle: Some(handle),
        })
    }

    async fn publish_retained(
        &self,
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
    ) -> Result<(), MqttError> {
        self.client
            .publish(topic, qos, true, payload)
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))
    }

    /// Best-effort offline announcement for graceful shutdown; unclean
    /// exits are covered by the last will.
    pub async fn announce_offline(&self) {
        if let Err(e) = self.publish_availability(Availability::Offline).await {
            warn!(error = %e, "offline announcement failed");
        }
    }

    pub async fn disconnect(&mut self) -> Result<(), MqttError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))?;
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
        info!("MQTT client disconnected");
        Ok(())
    }
}

#[async_trait]
impl StatePublisher for MqttPublisher {
    async fn publish_discovery(&self) -> Result<(), MqttError> {
        let contact = BinarySensorConfig::for_sensor(&self.sensor, &self.device_id);
        let payload = serde_json::to_vec(&contact).map_err(MqttError::SerializationError)?;
        self.publish_retained(
            TopicBuilder::discovery("binary_sensor", &self.sensor.entity_id),
            payload,
            QoS::AtLeastOnce,
        )
        .await?;

        let battery = BatterySensorConfig::for_sensor(&self.sensor, &self.device_id);
        let payload = serde_json::to_vec(&battery).map_err(MqttError::SerializationError)?;
        let battery_object_id = format!("{}_battery", self.sensor.entity_id);
        self.publish_retained(
            TopicBuilder::discovery("sensor", &battery_object_id),
            payload,
            QoS::AtLeastOnce,
        )
        .await?;

        info!("Published MQTT discovery configs");
        Ok(())
    }

    async fn publish_availability(&self, availability: Availability) -> Result<(), MqttError> {
        self.publish_retained(
            TopicBuilder::availability(&self.sensor.entity_id),
            availability.payload().as_bytes().to_vec(),
            QoS::AtLeastOnce,
        )
        .await
    }

    async fn publish_contact(&self, payload: &str) -> Result<(), MqttError> {
        self.publish_retained(
            TopicBuilder::state(&self.sensor.entity_id),
            payload.as_bytes().to_vec(),
            QoS::AtMostOnce,
        )
        .await
    }

    async fn publish_battery(&self, payload: &str) -> Result<(), MqttError> {
        self.publish_retained(
            TopicBuilder::battery(&self.sensor.entity_id),
            payload.as_bytes().to_vec(),
            QoS::AtMostOnce,
        )
        .await
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        // Drop cannot run async teardown; callers use disconnect() for a
        // graceful exit. This only reaps the driver task.
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }
}
