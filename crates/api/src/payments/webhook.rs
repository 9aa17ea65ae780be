//! Webhook signature verification and event parsing.
//!
//! The provider signs each delivery with a header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=...]` where the HMAC-SHA256 covers
//! `"<t>.<raw body>"` under the shared webhook secret.

use cartwright_core::PaymentId;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use super::WebhookError;

/// What an event means for the payment it correlates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Succeeded,
    Failed,
    /// Acknowledged but not acted on.
    Ignored,
}

/// Identifiers that can tie an event back to a stored payment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    pub payment_id: Option<PaymentId>,
    /// Payment attempt the session was created for.
    pub attempt: Option<i32>,
    pub session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub transaction_id: Option<String>,
}

/// A verified provider event.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub id: String,
    pub event_type: String,
    pub kind: EventKind,
    pub correlation: Correlation,
    /// The event's `data.object`, stored as the gateway payload.
    pub object: Value,
}

#[derive(Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: Value,
}

/// Verify a signature header against the raw payload.
///
/// # Errors
///
/// Returns `WebhookError::InvalidSignature` if the header is malformed or no
/// `v1` signature matches, and `WebhookError::StaleTimestamp` if the signed
/// timestamp is further than `tolerance_secs` from `now`.
pub fn verify_signature(
    secret: &SecretString,
    header: &str,
    payload: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| WebhookError::InvalidSignature("missing timestamp".to_string()))?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::InvalidSignature("invalid timestamp".to_string()))?;

    if signatures.is_empty() {
        return Err(WebhookError::InvalidSignature(
            "no v1 signature".to_string(),
        ));
    }

    let within_tolerance = now
        .checked_sub(ts)
        .map(i64::unsigned_abs)
        .is_some_and(|skew| skew <= tolerance_secs.unsigned_abs());
    if !within_tolerance {
        return Err(WebhookError::StaleTimestamp);
    }

    let expected = compute_signature(secret, timestamp, payload)?;

    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature(
            "signature mismatch".to_string(),
        ))
    }
}

/// Hex HMAC-SHA256 of `"<timestamp>.<payload>"`.
///
/// # Errors
///
/// Returns `WebhookError::InvalidSignature` if the secret cannot key the MAC.
pub fn compute_signature(
    secret: &SecretString,
    timestamp: &str,
    payload: &str,
) -> Result<String, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(e.to_string()))?;

    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Parse a verified payload into a [`ProviderEvent`].
///
/// # Errors
///
/// Returns `WebhookError::InvalidPayload` if the body is not an event envelope.
pub fn parse_event(payload: &str) -> Result<ProviderEvent, WebhookError> {
    let envelope: Envelope =
        serde_json::from_str(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    let object = envelope.data.object;
    let kind = classify(&envelope.event_type, &object);
    let correlation = correlate(&envelope.event_type, &object);

    Ok(ProviderEvent {
        id: envelope.id,
        event_type: envelope.event_type,
        kind,
        correlation,
        object,
    })
}

fn classify(event_type: &str, object: &Value) -> EventKind {
    match event_type {
        // A completed session can still be awaiting an asynchronous payment.
        "checkout.session.completed" => {
            if str_field(object, "payment_status").as_deref() == Some("unpaid") {
                EventKind::Ignored
            } else {
                EventKind::Succeeded
            }
        }
        "checkout.session.async_payment_succeeded" | "payment_intent.succeeded" => {
            EventKind::Succeeded
        }
        "checkout.session.async_payment_failed"
        | "checkout.session.expired"
        | "payment_intent.payment_failed" => EventKind::Failed,
        _ => EventKind::Ignored,
    }
}

fn correlate(event_type: &str, object: &Value) -> Correlation {
    let payment_id = metadata_int(object, "payment_id").map(PaymentId::new);
    let attempt = metadata_int(object, "attempt");

    if event_type.starts_with("payment_intent.") {
        let intent = str_field(object, "id");
        Correlation {
            payment_id,
            attempt,
            session_id: None,
            transaction_id: str_field(object, "latest_charge").or_else(|| intent.clone()),
            payment_intent_id: intent,
        }
    } else {
        let intent = str_field(object, "payment_intent");
        Correlation {
            payment_id,
            attempt,
            session_id: str_field(object, "id"),
            transaction_id: intent.clone(),
            payment_intent_id: intent,
        }
    }
}

/// Metadata values arrive as strings from the provider but tolerate numbers.
fn metadata_int(object: &Value, key: &str) -> Option<i32> {
    object
        .get("metadata")
        .and_then(|m| m.get(key))
        .and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            _ => None,
        })
}

fn str_field(object: &Value, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    fn secret() -> SecretString {
        SecretString::from("whsec_test_secret".to_string())
    }

    fn header_for(payload: &str, ts: i64) -> String {
        let sig = compute_signature(&secret(), &ts.to_string(), payload).unwrap();
        format!("t={ts},v1={sig}")
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_valid_signature() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = header_for(payload, NOW);
        assert!(verify_signature(&secret(), &header, payload, 300, NOW).is_ok());
    }

    #[test]
    fn test_any_matching_v1_is_accepted() {
        let payload = r#"{"id":"evt_1"}"#;
        let sig = compute_signature(&secret(), &NOW.to_string(), payload).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v0=ignored,v1={sig}");
        assert!(verify_signature(&secret(), &header, payload, 300, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = header_for(r#"{"id":"evt_1"}"#, NOW);
        let result = verify_signature(&secret(), &header, r#"{"id":"evt_2"}"#, 300, NOW);
        assert!(matches!(result, Err(WebhookError::InvalidSignature(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = "{}";
        let sig = compute_signature(
            &SecretString::from("whsec_other".to_string()),
            &NOW.to_string(),
            payload,
        )
        .unwrap();
        let header = format!("t={NOW},v1={sig}");
        assert!(verify_signature(&secret(), &header, payload, 300, NOW).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = "{}";
        let header = header_for(payload, NOW - 301);
        let result = verify_signature(&secret(), &header, payload, 300, NOW);
        assert!(matches!(result, Err(WebhookError::StaleTimestamp)));

        let header = header_for(payload, NOW - 300);
        assert!(verify_signature(&secret(), &header, payload, 300, NOW).is_ok());
    }

    #[test]
    fn test_malformed_header_rejected() {
        for header in ["", "v1=abc", "t=abc,v1=abc", "t=1760000000"] {
            let result = verify_signature(&secret(), header, "{}", 300, NOW);
            assert!(
                matches!(result, Err(WebhookError::InvalidSignature(_))),
                "header {header:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        for ts in [i64::MIN, i64::MAX, -1] {
            let header = format!("t={ts},v1=00");
            let result = verify_signature(&secret(), &header, "{}", 300, NOW);
            assert!(
                matches!(result, Err(WebhookError::StaleTimestamp)),
                "timestamp {ts} should be stale"
            );
        }
    }

    #[test]
    fn test_parse_session_completed() {
        let payload = r#"{
            "id": "evt_123",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "payment_intent": "pi_1",
                "payment_status": "paid",
                "metadata": {"order_id": "7", "payment_id": "3", "attempt": "2"}
            }}
        }"#;

        let event = parse_event(payload).unwrap();
        assert_eq!(event.id, "evt_123");
        assert_eq!(event.kind, EventKind::Succeeded);
        assert_eq!(event.correlation.payment_id, Some(PaymentId::new(3)));
        assert_eq!(event.correlation.attempt, Some(2));
        assert_eq!(event.correlation.session_id.as_deref(), Some("cs_test_1"));
        assert_eq!(event.correlation.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(event.correlation.transaction_id.as_deref(), Some("pi_1"));
    }

    #[test]
    fn test_unpaid_session_is_ignored() {
        let payload = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_1", "payment_status": "unpaid"}}
        }"#;
        assert_eq!(parse_event(payload).unwrap().kind, EventKind::Ignored);
    }

    #[test]
    fn test_parse_payment_intent_failed() {
        let payload = r#"{
            "id": "evt_9",
            "type": "payment_intent.payment_failed",
            "data": {"object": {"id": "pi_9", "metadata": {}}}
        }"#;

        let event = parse_event(payload).unwrap();
        assert_eq!(event.kind, EventKind::Failed);
        assert_eq!(event.correlation.payment_id, None);
        assert_eq!(event.correlation.attempt, None);
        assert_eq!(event.correlation.session_id, None);
        assert_eq!(event.correlation.payment_intent_id.as_deref(), Some("pi_9"));
    }

    #[test]
    fn test_session_expired_is_failure() {
        let payload = r#"{
            "id": "evt_2",
            "type": "checkout.session.expired",
            "data": {"object": {"id": "cs_2", "metadata": {"payment_id": 4}}}
        }"#;
        let event = parse_event(payload).unwrap();
        assert_eq!(event.kind, EventKind::Failed);
        assert_eq!(event.correlation.payment_id, Some(PaymentId::new(4)));
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let payload = r#"{"id": "evt_3", "type": "charge.refunded", "data": {"object": {}}}"#;
        assert_eq!(parse_event(payload).unwrap().kind, EventKind::Ignored);
    }

    #[test]
    fn test_invalid_payload() {
        assert!(matches!(
            parse_event("not json"),
            Err(WebhookError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_event(r#"{"id": "evt_1"}"#),
            Err(WebhookError::InvalidPayload(_))
        ));
    }
}
