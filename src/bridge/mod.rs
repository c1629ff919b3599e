//! The poll loop and the availability state machine it drives.

pub mod availability;
pub mod runner;

pub use availability::{Availability, AvailabilityTracker};
pub use runner::BridgeLoop;

use crate::extract::PropertySnapshot;
use crate::tuya::TuyaError;
use async_trait::async_trait;

/// Upstream seam the loop polls through: one call per tick, strictly
/// sequential, no two fetches ever in flight at once.
#[async_trait]
pub trait ShadowSource: Send {
    async fn poll_properties(&mut self) -> Result<PropertySnapshot, TuyaError>;
}
