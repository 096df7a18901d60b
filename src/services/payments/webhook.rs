//! Stripe webhook signatures and event decoding.
//!
//! `Stripe-Signature: t=<unix seconds>,v1=<hex hmac>[,v1=...][,v0=...]`
//!
//! The signed payload is `"{t}.{raw body}"`, HMAC-SHA256 with the endpoint
//! secret. Events older (or newer) than the tolerance are rejected.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::core::errors::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Raw event envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

/// The events the marketplace reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StripeEvent {
    PaymentSucceeded { intent_id: String, order_id: Option<String> },
    PaymentFailed { intent_id: String, order_id: Option<String> },
    AccountUpdated { account_id: String, charges_enabled: bool },
    Ignored(String),
}

impl WebhookEvent {
    fn object_str(&self, field: &str) -> Option<String> {
        self.data.object.get(field)?.as_str().map(str::to_string)
    }

    fn order_id(&self) -> Option<String> {
        self.data
            .object
            .get("metadata")?
            .get("order_id")?
            .as_str()
            .map(str::to_string)
    }

    pub fn classify(&self) -> StripeEvent {
        let object_id = self.object_str("id");
        match (self.kind.as_str(), object_id) {
            ("payment_intent.succeeded", Some(intent_id)) => StripeEvent::PaymentSucceeded {
                intent_id,
                order_id: self.order_id(),
            },
            ("payment_intent.payment_failed", Some(intent_id)) => StripeEvent::PaymentFailed {
                intent_id,
                order_id: self.order_id(),
            },
            ("account.updated", Some(account_id)) => StripeEvent::AccountUpdated {
                account_id,
                charges_enabled: self
                    .data
                    .object
                    .get("charges_enabled")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            },
            _ => StripeEvent::Ignored(self.kind.clone()),
        }
    }
}

fn parse_header(header: &str) -> Option<(&str, Vec<&str>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    Some((timestamp?, signatures))
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, seconds: i64) -> Self {
        self.tolerance = seconds;
        self
    }

    fn mac(&self, timestamp: &str, payload: &[u8]) -> AppResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::InternalError(format!("Failed to create HMAC: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Header value Stripe would send for `payload` at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> AppResult<String> {
        let t = timestamp.to_string();
        let signature = hex::encode(self.mac(&t, payload)?.finalize().into_bytes());
        Ok(format!("t={},v1={}", t, signature))
    }

    pub fn verify(&self, payload: &[u8], header: &str, now: i64) -> AppResult<WebhookEvent> {
        let invalid = |reason: &str| {
            log::warn!("Rejected Stripe webhook: {}", reason);
            AppError::InvalidParameter(format!("Invalid Stripe signature: {}", reason))
        };

        let (timestamp, signatures) = parse_header(header).ok_or_else(|| invalid("missing timestamp"))?;
        let issued_at: i64 = timestamp.parse().map_err(|_| invalid("malformed timestamp"))?;
        if now.abs_diff(issued_at) > self.tolerance.unsigned_abs() {
            return Err(invalid("timestamp outside tolerance"));
        }
        if signatures.is_empty() {
            return Err(invalid("no v1 signature"));
        }

        let mac = self.mac(timestamp, payload)?;
        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(invalid("signature mismatch"));
        }

        serde_json::from_slice(payload)
            .map_err(|e| AppError::InvalidParameter(format!("Malformed Stripe event: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    fn payload(kind: &str, object: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": "evt_1",
            "type": kind,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_signature_is_accepted() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = payload("payment_intent.succeeded", serde_json::json!({
            "id": "pi_1",
            "metadata": { "order_id": "65f0a1b2c3d4e5f607182930" }
        }));
        let header = verifier.sign(&body, NOW).unwrap();

        let event = verifier.verify(&body, &header, NOW + 10).unwrap();
        assert_eq!(
            event.classify(),
            StripeEvent::PaymentSucceeded {
                intent_id: "pi_1".to_string(),
                order_id: Some("65f0a1b2c3d4e5f607182930".to_string()),
            }
        );
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = payload("account.updated", serde_json::json!({ "id": "acct_1", "charges_enabled": true }));
        let header = verifier.sign(&body, NOW).unwrap();

        let tampered = payload("account.updated", serde_json::json!({ "id": "acct_2", "charges_enabled": true }));
        assert!(matches!(
            verifier.verify(&tampered, &header, NOW),
            Err(AppError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let body = payload("account.updated", serde_json::json!({ "id": "acct_1" }));
        let header = WebhookVerifier::new("whsec_other").sign(&body, NOW).unwrap();

        assert!(WebhookVerifier::new(SECRET).verify(&body, &header, NOW).is_err());
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = payload("account.updated", serde_json::json!({ "id": "acct_1" }));
        let header = verifier.sign(&body, NOW).unwrap();

        assert!(verifier.verify(&body, &header, NOW + DEFAULT_TOLERANCE_SECS).is_ok());
        assert!(verifier.verify(&body, &header, NOW + DEFAULT_TOLERANCE_SECS + 1).is_err());
    }

    #[test]
    fn test_extreme_timestamps_are_rejected_without_overflow() {
        let verifier = WebhookVerifier::new(SECRET);
        for header in [
            "t=-9223372036854775808,v1=00",
            "t=9223372036854775807,v1=00",
        ] {
            assert!(matches!(
                verifier.verify(b"{}", header, NOW),
                Err(AppError::InvalidParameter(_))
            ));
        }
        assert!(verifier.verify(b"{}", "t=0,v1=00", i64::MIN).is_err());
    }

    #[test]
    fn test_any_matching_v1_signature_is_enough() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = payload("account.updated", serde_json::json!({ "id": "acct_1" }));
        let signed = verifier.sign(&body, NOW).unwrap();
        let header = signed.replace("v1=", "v1=deadbeef,v0=abc,v1=");

        assert!(verifier.verify(&body, &header, NOW).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = payload("account.updated", serde_json::json!({ "id": "acct_1" }));

        assert!(verifier.verify(&body, "", NOW).is_err());
        assert!(verifier.verify(&body, "v1=abc", NOW).is_err());
        assert!(verifier.verify(&body, &format!("t={}", NOW), NOW).is_err());
        assert!(verifier.verify(&body, &format!("t={},v1=zz", NOW), NOW).is_err());
    }

    #[test]
    fn test_unknown_events_are_ignored() {
        let event: WebhookEvent =
            serde_json::from_slice(&payload("charge.refunded", serde_json::json!({ "id": "ch_1" }))).unwrap();
        assert_eq!(event.classify(), StripeEvent::Ignored("charge.refunded".to_string()));
    }

    #[test]
    fn test_account_updated_defaults_to_disabled() {
        let event: WebhookEvent =
            serde_json::from_slice(&payload("account.updated", serde_json::json!({ "id": "acct_9" }))).unwrap();
        assert_eq!(
            event.classify(),
            StripeEvent::AccountUpdated { account_id: "acct_9".to_string(), charges_enabled: false }
        );
    }
}
