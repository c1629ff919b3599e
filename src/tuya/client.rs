//! Signed Tuya OpenAPI client with token lifecycle management.
//!
//! One high-level operation matters to the bridge: fetch the current
//! device-shadow properties. Signing, the token endpoint, and the one-shot
//! refresh on an invalid-token response all exist to serve it. Requests are
//! strictly sequential; the client holds no locks because only the poll
//! loop calls it.

use crate::bridge::ShadowSource;
use crate::extract::PropertySnapshot;
use crate::tuya::sign::{RequestDescriptor, SignedEnvelope};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Response code the server uses to signal an expired or invalid token.
pub const TOKEN_INVALID_CODE: i64 = 1010;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const TOKEN_PATH: &str = "/v1.0/token";

/// Uniform failure taxonomy surfaced to the caller. Everything the client
/// can hit becomes a tagged result; nothing propagates as a panic.
#[derive(Debug, Error)]
pub enum TuyaError {
    /// The server was unreachable, timed out, or returned a non-JSON body.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// A well-formed response that signals failure, including an exhausted
    /// token-refresh sequence.
    #[error("api error (code {code}): {message}")]
    Api { code: i64, message: String },
}

/// Standard OpenAPI response envelope: `{success, code, result, msg}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl ApiEnvelope {
    fn into_api_error(self) -> TuyaError {
        TuyaError::Api {
            code: self.code,
            message: self.msg.unwrap_or_else(|| "request failed".to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ShadowResult {
    #[serde(default)]
    properties: ShadowProperties,
}

/// The cloud returns properties either as a `[{code, value}]` list or as a
/// flat map, depending on the device model.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ShadowProperties {
    List(Vec<ShadowProperty>),
    Map(HashMap<String, Value>),
}

impl Default for ShadowProperties {
    fn default() -> Self {
        ShadowProperties::List(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct ShadowProperty {
    code: Option<String>,
    value: Option<Value>,
}

/// Access token held for the lifetime of one authenticated session. Owned
/// exclusively by the client; superseded on every successful refresh and
/// never persisted across restarts.
#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    obtained_at: Instant,
}

/// Tuya OpenAPI client using v2 request signing.
pub struct TuyaClient {
    http: Client,
    base_url: String,
    access_id: String,
    access_key: String,
    token: Option<AccessToken>,
}

impl TuyaClient {
    pub fn new(base_url: &str, access_id: &str, access_key: &str) -> Result<Self, TuyaError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TuyaError::Transport {
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_id: access_id.to_string(),
            access_key: access_key.to_string(),
            token: None,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Obtain a fresh access token via an unauthenticated signed GET. The
    /// held token, if any, is superseded only on success.
    pub async fn authenticate(&mut self) -> Result<(), TuyaError> {
        let descriptor = RequestDescriptor::get(TOKEN_PATH, &[("grant_type", "1")]);
        let envelope = self.send(&descriptor, None).await?;
        if !envelope.success {
            return Err(envelope.into_api_error());
        }

        let token = envelope
            .result
            .as_ref()
            .and_then(|r| r.get("access_token"))
            .and_then(Value::as_str)
            .map(String::from);
        let Some(token) = token else {
            return Err(TuyaError::Api {
                code: envelope.code,
                message: "token endpoint returned no access_token".to_string(),
            });
        };

        let expires_in = envelope
            .result
            .as_ref()
            .and_then(|r| r.get("expire_time"))
            .and_then(Value::as_i64);
        if let Some(previous) = &self.token {
            debug!(
                held_secs = previous.obtained_at.elapsed().as_secs(),
                "superseding held token"
            );
        }
        self.token = Some(AccessToken {
            value: token,
            obtained_at: Instant::now(),
        });
        info!(expires_in = ?expires_in, "Tuya token obtained");
        Ok(())
    }

    /// Authenticated signed GET. Detects the invalid-token response and
    /// performs exactly one refresh followed by exactly one retry as an
    /// explicit two-step sequence; a second invalid-token response, or a
    /// failed refresh, surfaces the failure to the caller.
    pub async fn get(&mut self, path: &str, params: &[(&str, &str)]) -> Result<Value, TuyaError> {
        let descriptor = RequestDescriptor::get(path, params);

        let first = self.send(&descriptor, self.token_value()).await?;
        if first.success || first.code != TOKEN_INVALID_CODE {
            return Self::unwrap_envelope(first);
        }

        warn!("token invalid; refreshing");
        if self.authenticate().await.is_err() {
            return Err(first.into_api_error());
        }

        // The retry is re-signed with a fresh timestamp and nonce, never
        // replayed.
        let second = self.send(&descriptor, self.token_value()).await?;
        Self::unwrap_envelope(second)
    }

    /// Fetch the current device-shadow properties as a fresh code -> value
    /// snapshot. A partial or missing property set is returned as-is,
    /// never padded with stale values.
    pub async fn fetch_shadow_properties(
        &mut self,
        device_id: &str,
    ) -> Result<PropertySnapshot, TuyaError> {
        let path = format!("/v2.0/cloud/thing/{device_id}/shadow/properties");
        let result = self.get(&path, &[]).await?;

        let shadow: ShadowResult = serde_json::from_value(result).unwrap_or_default();
        let snapshot: PropertySnapshot = match shadow.properties {
            ShadowProperties::List(items) => items
                .into_iter()
                .filter_map(|item| Some((item.code?, item.value.unwrap_or(Value::Null))))
                .collect(),
            ShadowProperties::Map(map) => map,
        };

        debug!(codes = snapshot.len(), "shadow snapshot fetched");
        Ok(snapshot)
    }

    fn token_value(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.value.as_str())
    }

    fn unwrap_envelope(envelope: ApiEnvelope) -> Result<Value, TuyaError> {
        if envelope.success {
            Ok(envelope.result.unwrap_or(Value::Null))
        } else {
            Err(envelope.into_api_error())
        }
    }

    /// One signed request attempt with a fresh envelope.
    async fn send(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<ApiEnvelope, TuyaError> {
        let envelope = SignedEnvelope::seal(descriptor, &self.access_id, &self.access_key, token);
        let url = format!("{}{}", self.base_url, envelope.path_with_query);

        let mut request = self
            .http
            .get(&url)
            .header("client_id", &self.access_id)
            .header("sign", &envelope.signature)
            .header("t", &envelope.timestamp)
            .header("nonce", &envelope.nonce)
            .header("sign_method", "HMAC-SHA256");
        if let Some(token) = &envelope.token {
            request = request.header("access_token", token);
        }

        let response = request.send().await.map_err(|e| TuyaError::Transport {
            message: e.to_string(),
        })?;

        // Structured failures arrive with non-2xx statuses too; the body
        // decides, not the status line.
        response
            .json::<ApiEnvelope>()
            .await
            .map_err(|e| TuyaError::Transport {
                message: format!("non-JSON response: {e}"),
            })
    }
}

/// Binds a client to the single configured device for the bridge loop.
pub struct TuyaShadowSource {
    client: TuyaClient,
    device_id: String,
}

impl TuyaShadowSource {
    pub fn new(client: TuyaClient, device_id: &str) -> Self {
        Self {
            client,
            device_id: device_id.to_string(),
        }
    }

    pub fn client_mut(&mut self) -> &mut TuyaClient {
        &mut self.client
    }
}

#[async_trait]
impl ShadowSource for TuyaShadowSource {
    async fn poll_properties(&mut self) -> Result<PropertySnapshot, TuyaError> {
        self.client.fetch_shadow_properties(&self.device_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_defaults_tolerate_missing_fields() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({})).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.code, 0);
        assert!(envelope.msg.is_none());
        assert!(envelope.result.is_none());
    }

    #[test]
    fn test_shadow_properties_list_form() {
        let shadow: ShadowResult = serde_json::from_value(json!({
            "properties": [
                {"code": "doorcontact_state", "value": true},
                {"code": "battery_percentage", "value": 87},
                {"value": 3},
            ]
        }))
        .unwrap();

        let ShadowProperties::List(items) = shadow.properties else {
            panic!("expected list form");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].code.as_deref(), Some("doorcontact_state"));
        assert!(items[2].code.is_none());
    }

    #[test]
    fn test_shadow_properties_map_form() {
        let shadow: ShadowResult = serde_json::from_value(json!({
            "properties": {"doorcontact_state": true, "battery": 50}
        }))
        .unwrap();

        let ShadowProperties::Map(map) = shadow.properties else {
            panic!("expected map form");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("battery"), Some(&json!(50)));
    }

    #[test]
    fn test_shadow_result_missing_properties_defaults_empty() {
        let shadow: ShadowResult = serde_json::from_value(json!({})).unwrap();
        let ShadowProperties::List(items) = shadow.properties else {
            panic!("expected empty list default");
        };
        assert!(items.is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = TuyaClient::new("https://openapi.tuyaeu.com/", "id", "key").unwrap();
        assert_eq!(client.base_url, "https://openapi.tuyaeu.com");
        assert!(!client.has_token());
    }
}
