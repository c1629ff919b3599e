//! In-memory implementations of `ShadowSource` and `StatePublisher`.
//!
//! `ScriptedSource` replays a fixed sequence of poll outcomes;
//! `RecordingPublisher` captures every publish so assertions can check
//! exact payloads and ordering.

use crate::bridge::{Availability, ShadowSource};
use crate::extract::PropertySnapshot;
use crate::mqtt::{MqttError, StatePublisher};
use crate::tuya::TuyaError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One captured publish, in the order the loop issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    Discovery,
    Availability(String),
    Contact(String),
    Battery(String),
}

/// Records publishes instead of talking to a broker.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Published>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }

    fn record(&self, entry: Published) {
        self.published.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl StatePublisher for RecordingPublisher {
    async fn publish_discovery(&self) -> Result<(), MqttError> {
        self.record(Published::Discovery);
        Ok(())
    }

    async fn publish_availability(&self, availability: Availability) -> Result<(), MqttError> {
        self.record(Published::Availability(availability.payload().to_string()));
        Ok(())
    }

    async fn publish_contact(&self, payload: &str) -> Result<(), MqttError> {
        self.record(Published::Contact(payload.to_string()));
        Ok(())
    }

    async fn publish_battery(&self, payload: &str) -> Result<(), MqttError> {
        self.record(Published::Battery(payload.to_string()));
        Ok(())
    }
}

/// Replays scripted poll outcomes in order. Polling past the end of the
/// script yields a transport error.
pub struct ScriptedSource {
    responses: VecDeque<Result<PropertySnapshot, TuyaError>>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<PropertySnapshot, TuyaError>>) -> Self {
        Self {
            responses: responses.into(),
        }
    }

    pub fn push(&mut self, response: Result<PropertySnapshot, TuyaError>) {
        self.responses.push_back(response);
    }

    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

#[async_trait]
impl ShadowSource for ScriptedSource {
    async fn poll_properties(&mut self) -> Result<PropertySnapshot, TuyaError> {
        self.responses.pop_front().unwrap_or_else(|| {
            Err(TuyaError::Transport {
                message: "scripted source exhausted".to_string(),
            })
        })
    }
}
