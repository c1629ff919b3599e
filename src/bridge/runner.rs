//! The polling loop: fetch the shadow, map properties, publish state.
//!
//! One tick per poll interval, strictly sequential. A tick never aborts
//! the loop; fetch and publish failures are logged and folded into the
//! availability tracker.

use crate::bridge::availability::{Availability, AvailabilityTracker};
use crate::bridge::ShadowSource;
use crate::error::BridgeResult;
use crate::extract::{extract, Reading};
use crate::mqtt::StatePublisher;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives one shadow source into one publisher.
pub struct BridgeLoop<S: ShadowSource, P: StatePublisher> {
    source: S,
    publisher: P,
    tracker: AvailabilityTracker,
    poll_interval: Duration,
}

impl<S: ShadowSource, P: StatePublisher> BridgeLoop<S, P> {
    pub fn new(source: S, publisher: P, poll_interval: Duration, offline_after: Duration) -> Self {
        Self {
            source,
            publisher,
            tracker: AvailabilityTracker::new(Instant::now(), offline_after),
            poll_interval,
        }
    }

    /// Startup announcement: retained discovery configs plus the initial
    /// optimistic `online`. The first ticks get to prove the device is
    /// actually reachable before the offline window expires.
    pub async fn announce(&self) -> BridgeResult<()> {
        self.publisher.publish_discovery().await?;
        self.publisher
            .publish_availability(Availability::Online)
            .await?;
        Ok(())
    }

    /// Poll until cancelled. Runs under a `select!` against shutdown
    /// signals in the binary, so there is no exit path of its own.
    pub async fn run(&mut self) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Bridge loop started"
        );
        loop {
            self.tick(Instant::now()).await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// A single poll cycle. `now` is injected so tests can walk the
    /// availability window without sleeping.
    pub async fn tick(&mut self, now: Instant) {
        match self.source.poll_properties().await {
            Ok(snapshot) if !snapshot.is_empty() => {
                if let Some(transition) = self.tracker.record_success(now) {
                    info!("Device reachable again, back online");
                    self.publish_availability(transition).await;
                }
                self.publish_reading(extract(&snapshot)).await;
            }
            Ok(_) => {
                debug!("Shadow returned no properties");
                self.handle_no_data(now).await;
            }
            Err(e) => {
                warn!(error = %e, "Shadow poll failed");
                self.handle_no_data(now).await;
            }
        }
    }

    async fn handle_no_data(&mut self, now: Instant) {
        if let Some(transition) = self.tracker.record_failure(now) {
            warn!(
                silent_secs = self.tracker.seconds_since_last_success(now),
                "No device data past threshold, marking offline"
            );
            self.publish_availability(transition).await;
        }
    }

    /// Republishes everything present on every successful tick; the
    /// retained topics make duplicates free at the broker.
    async fn publish_reading(&self, reading: Reading) {
        match reading.contact {
            Some(open) => {
                let payload = if open { "ON" } else { "OFF" };
                if let Err(e) = self.publisher.publish_contact(payload).await {
                    warn!(error = %e, "Contact publish failed");
                }
            }
            None => debug!("No contact property in snapshot"),
        }

        match reading.battery {
            Some(percent) => {
                if let Err(e) = self.publisher.publish_battery(&percent.to_string()).await {
                    warn!(error = %e, "Battery publish failed");
                }
            }
            None => debug!("No battery property in snapshot"),
        }
    }

    async fn publish_availability(&self, availability: Availability) {
        if let Err(e) = self.publisher.publish_availability(availability).await {
            warn!(error = %e, "Availability publish failed");
        }
    }

    pub fn availability(&self) -> Availability {
        self.tracker.state()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }
}
