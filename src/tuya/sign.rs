//! Tuya OpenAPI v2 request signing.
//!
//! The signature must match the server byte for byte:
//!
//! ```text
//! string_to_sign = METHOD + "\n" + SHA256(body) + "\n" + headersPart + "\n" + pathWithQuery
//! message        = client_id + [access_token] + t + nonce + string_to_sign
//! sign           = HMAC-SHA256(access_key, message).hex().upper()
//! ```
//!
//! The headers segment is permanently empty here, which leaves a blank
//! third line in the string to sign.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// An HTTP request to be signed: method, path and unordered query pairs.
/// Immutable once built; the signer canonicalizes the query on use.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    /// Describe a GET request. Query pairs may arrive in any order.
    pub fn get(path: &str, query: &[(&str, &str)]) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            method: "GET".to_string(),
            path,
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: None,
        }
    }

    /// Attach a body. Unused by the bridge (it only issues GETs) but part
    /// of the signing contract.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// Path with the canonical (sorted) query string appended.
    pub fn path_with_query(&self) -> String {
        let query = canonical_query(&self.query);
        if query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, query)
        }
    }
}

/// `key=value` pairs joined by `&`, sorted lexicographically by key. The
/// ordering is load-bearing: the server recomputes the signature over the
/// exact path-with-query it receives.
fn canonical_query(pairs: &[(String, String)]) -> String {
    let mut sorted = pairs.to_vec();
    sorted.sort();
    sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// A request descriptor sealed with credential/token state. Timestamp and
/// nonce are generated fresh per attempt; a retried request gets a new
/// envelope, never a reused one.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub path_with_query: String,
    pub timestamp: String,
    pub nonce: String,
    pub signature: String,
    pub token: Option<String>,
}

impl SignedEnvelope {
    /// Sign `descriptor` with a fresh millisecond timestamp and nonce.
    pub fn seal(
        descriptor: &RequestDescriptor,
        access_id: &str,
        access_key: &str,
        token: Option<&str>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        Self::seal_at(descriptor, access_id, access_key, token, timestamp, nonce)
    }

    /// Deterministic variant with caller-supplied timestamp and nonce.
    /// Identical inputs always produce an identical signature.
    pub fn seal_at(
        descriptor: &RequestDescriptor,
        access_id: &str,
        access_key: &str,
        token: Option<&str>,
        timestamp: String,
        nonce: String,
    ) -> Self {
        let path_with_query = descriptor.path_with_query();
        let content_hash = sha256_hex(descriptor.body());
        let string_to_sign = format!(
            "{}\n{}\n\n{}",
            descriptor.method(),
            content_hash,
            path_with_query
        );

        // Token segment is omitted entirely (not empty-stringed) when the
        // request is unauthenticated.
        let mut message = String::from(access_id);
        if let Some(token) = token {
            message.push_str(token);
        }
        message.push_str(&timestamp);
        message.push_str(&nonce);
        message.push_str(&string_to_sign);

        let signature = hmac_sha256_hex_upper(access_key.as_bytes(), message.as_bytes());

        Self {
            path_with_query,
            timestamp,
            nonce,
            signature,
            token: token.map(String::from),
        }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::default();
    hasher.update(data);
    let digest = hasher.finalize();
    format!("{digest:x}")
}

fn hmac_sha256_hex_upper(key: &[u8], message: &[u8]) -> String {
    // HMAC-SHA256 accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(message);
    let digest = mac.finalize().into_bytes();
    format!("{digest:X}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EMPTY_BODY_SHA256: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn seal_fixed(descriptor: &RequestDescriptor, token: Option<&str>) -> SignedEnvelope {
        SignedEnvelope::seal_at(
            descriptor,
            "client-id",
            "client-secret",
            token,
            "1700000000000".to_string(),
            "0123456789abcdef0123456789abcdef".to_string(),
        )
    }

    #[test]
    fn test_signature_is_deterministic() {
        let descriptor = RequestDescriptor::get("/v1.0/token", &[("grant_type", "1")]);
        let first = seal_fixed(&descriptor, None);
        let second = seal_fixed(&descriptor, None);
        assert_eq!(first.signature, second.signature);
        assert_eq!(first.path_with_query, second.path_with_query);
    }

    #[test]
    fn test_signature_is_uppercase_hex() {
        let descriptor = RequestDescriptor::get("/v1.0/token", &[]);
        let envelope = seal_fixed(&descriptor, None);
        assert_eq!(envelope.signature.len(), 64);
        assert!(envelope
            .signature
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_query_order_is_irrelevant() {
        let forward = RequestDescriptor::get("/v1.0/devices", &[("a", "1"), ("b", "2")]);
        let reversed = RequestDescriptor::get("/v1.0/devices", &[("b", "2"), ("a", "1")]);
        assert_eq!(forward.path_with_query(), "/v1.0/devices?a=1&b=2");
        assert_eq!(
            seal_fixed(&forward, None).signature,
            seal_fixed(&reversed, None).signature
        );
    }

    #[test]
    fn test_path_without_leading_slash_is_normalized() {
        let descriptor = RequestDescriptor::get("v1.0/token", &[]);
        assert_eq!(descriptor.path_with_query(), "/v1.0/token");
    }

    #[test]
    fn test_changing_any_input_changes_signature() {
        let base = RequestDescriptor::get("/v1.0/devices", &[("page", "1")]);
        let base_sig = seal_fixed(&base, None).signature;

        let other_path = RequestDescriptor::get("/v1.0/device", &[("page", "1")]);
        assert_ne!(seal_fixed(&other_path, None).signature, base_sig);

        let other_query = RequestDescriptor::get("/v1.0/devices", &[("page", "2")]);
        assert_ne!(seal_fixed(&other_query, None).signature, base_sig);

        let with_body = RequestDescriptor::get("/v1.0/devices", &[("page", "1")])
            .with_body(b"x".to_vec());
        assert_ne!(seal_fixed(&with_body, None).signature, base_sig);
    }

    #[test]
    fn test_token_segment_changes_signature() {
        let descriptor = RequestDescriptor::get("/v2.0/cloud/thing/dev1/shadow/properties", &[]);
        let anonymous = seal_fixed(&descriptor, None);
        let authenticated = seal_fixed(&descriptor, Some("tok-123"));
        assert_ne!(anonymous.signature, authenticated.signature);
        assert_eq!(authenticated.token.as_deref(), Some("tok-123"));
        assert!(anonymous.token.is_none());
    }

    #[test]
    fn test_empty_body_hash_matches_known_digest() {
        assert_eq!(sha256_hex(b""), EMPTY_BODY_SHA256);
    }

    #[test]
    fn test_fresh_seal_generates_new_nonce_per_attempt() {
        let descriptor = RequestDescriptor::get("/v1.0/token", &[("grant_type", "1")]);
        let first = SignedEnvelope::seal(&descriptor, "id", "key", None);
        let second = SignedEnvelope::seal(&descriptor, "id", "key", None);
        assert_ne!(first.nonce, second.nonce);
        assert_eq!(first.nonce.len(), 32);
    }

    proptest! {
        #[test]
        fn prop_signature_independent_of_query_insertion_order(
            pairs in proptest::collection::vec(("[a-z]{1,8}", "[a-z0-9]{0,8}"), 0..6)
        ) {
            let forward: Vec<(&str, &str)> =
                pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            let mut backward = forward.clone();
            backward.reverse();

            let a = RequestDescriptor::get("/v1.0/devices", &forward);
            let b = RequestDescriptor::get("/v1.0/devices", &backward);
            prop_assert_eq!(
                seal_fixed(&a, None).signature,
                seal_fixed(&b, None).signature
            );
        }

        #[test]
        fn prop_resigning_identical_inputs_is_stable(
            path in "/[a-z0-9/]{1,20}",
            token in proptest::option::of("[a-z0-9]{8,32}")
        ) {
            let descriptor = RequestDescriptor::get(&path, &[]);
            let first = seal_fixed(&descriptor, token.as_deref());
            let second = seal_fixed(&descriptor, token.as_deref());
            prop_assert_eq!(first.signature, second.signature);
        }
    }
}
