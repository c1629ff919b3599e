//! Tuya OpenAPI integration: request signing and the signed HTTP client.

pub mod client;
pub mod sign;

pub use client::{ApiEnvelope, TuyaClient, TuyaError, TuyaShadowSource, TOKEN_INVALID_CODE};
pub use sign::{RequestDescriptor, SignedEnvelope};
