//! Response-envelope normalization for the backend gateway.
//!
//! Some backend paths return the payload directly; others arrive wrapped by
//! a gateway indirection layer that stores the real payload as a
//! JSON-encoded string under a `body` field, with a `statusCode` alongside.
//! Everything downstream of this module sees one flat payload shape.

use serde_json::{Map, Value};
use tracing::warn;

use crate::{Result, StampTrailError};

/// How the payload arrived on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// The response body was the payload itself.
    Direct,
    /// The payload was a JSON-encoded string inside an outer `body` field.
    GatewayWrapped,
}

/// A decoded, unwrapped, classification-checked response payload.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub payload: Value,
    pub kind: EnvelopeKind,
}

/// Decode a raw response body into a JSON value.
///
/// The body is read as text by the caller. A declared JSON content type is
/// parsed strictly; otherwise non-empty text is parsed opportunistically and
/// kept as a message-only payload when it is not JSON. An empty body becomes
/// an empty object.
pub fn decode_body(content_type: Option<&str>, text: &str) -> Result<Value> {
    let declared_json = content_type
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    if declared_json {
        return serde_json::from_str(trimmed).map_err(|e| {
            StampTrailError::Connectivity(format!("response could not be parsed: {}", e))
        });
    }

    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(_) => Ok(serde_json::json!({ "message": text })),
    }
}

/// Flatten a gateway-wrapped payload.
///
/// When the decoded value carries a string-typed `body` field, that string
/// is parsed as JSON and its fields are merged over the outer object, with
/// the wrapper field dropped. A body that does not parse is left in place
/// and logged; the outer payload is kept as-is.
pub fn unwrap_gateway(value: Value) -> (Value, EnvelopeKind) {
    let mut outer = match value {
        Value::Object(outer) => outer,
        other => return (other, EnvelopeKind::Direct),
    };

    let inner_text = match outer.get("body") {
        Some(Value::String(text)) => text.clone(),
        _ => return (Value::Object(outer), EnvelopeKind::Direct),
    };

    match serde_json::from_str::<Value>(&inner_text) {
        Ok(Value::Object(inner)) => {
            outer.remove("body");
            for (key, val) in inner {
                outer.insert(key, val);
            }
            (Value::Object(outer), EnvelopeKind::GatewayWrapped)
        }
        Ok(_) | Err(_) => {
            warn!("gateway body field did not decode as a JSON object; keeping outer payload");
            (Value::Object(outer), EnvelopeKind::Direct)
        }
    }
}

/// Classify a decoded payload against the transport status.
///
/// A non-2xx transport status, or a numeric `statusCode` field of 400 or
/// above inside the payload, is an application error carrying the most
/// specific message available and the payload itself for diagnostics.
pub fn classify(transport_status: u16, payload: &Value) -> Result<()> {
    let payload_status = payload
        .get("statusCode")
        .and_then(Value::as_u64)
        .map(|s| s as u16);

    let transport_ok = (200..300).contains(&transport_status);
    let payload_ok = payload_status.map(|s| s < 400).unwrap_or(true);
    if transport_ok && payload_ok {
        return Ok(());
    }

    let status = payload_status
        .filter(|s| *s >= 400)
        .unwrap_or(transport_status);
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP error, status: {}", status));

    Err(StampTrailError::application(message, status, payload.clone()))
}

/// Full normalization pipeline: decode, unwrap, classify.
pub fn normalize(transport_status: u16, content_type: Option<&str>, text: &str) -> Result<Normalized> {
    let decoded = decode_body(content_type, text)?;
    let (payload, kind) = unwrap_gateway(decoded);
    classify(transport_status, &payload)?;
    Ok(Normalized { payload, kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_payload_passes_through() {
        let normalized = normalize(200, Some("application/json"), r#"{"ok":true,"within":false}"#)
            .unwrap();
        assert_eq!(normalized.kind, EnvelopeKind::Direct);
        assert_eq!(normalized.payload["within"], json!(false));
    }

    #[test]
    fn wrapped_payload_is_flattened() {
        let body = r#"{"statusCode":200,"body":"{\"ok\":true,\"name\":\"Plaza\"}"}"#;
        let normalized = normalize(200, Some("application/json"), body).unwrap();
        assert_eq!(normalized.kind, EnvelopeKind::GatewayWrapped);
        assert_eq!(normalized.payload["name"], json!("Plaza"));
        assert!(normalized.payload.get("body").is_none());
    }

    #[test]
    fn doubly_wrapped_error_yields_inner_message() {
        let body = r#"{"statusCode":400,"body":"{\"message\":\"x\"}"}"#;
        let err = normalize(200, Some("application/json"), body).unwrap_err();
        match err {
            StampTrailError::Application { message, status, .. } => {
                assert_eq!(message, "x");
                assert_eq!(status, 400);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_inner_body_keeps_outer_payload() {
        let body = r#"{"statusCode":200,"ok":true,"body":"not json"}"#;
        let normalized = normalize(200, Some("application/json"), body).unwrap();
        assert_eq!(normalized.kind, EnvelopeKind::Direct);
        assert_eq!(normalized.payload["body"], json!("not json"));
        assert_eq!(normalized.payload["ok"], json!(true));
    }

    #[test]
    fn http_error_without_message_uses_status_text() {
        let err = normalize(502, Some("application/json"), r#"{}"#).unwrap_err();
        match err {
            StampTrailError::Application { message, status, .. } => {
                assert_eq!(status, 502);
                assert!(message.contains("502"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn http_error_prefers_payload_message() {
        let err = normalize(403, Some("application/json"), r#"{"message":"no entry"}"#).unwrap_err();
        match err {
            StampTrailError::Application { message, .. } => assert_eq!(message, "no entry"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn plain_text_becomes_message_payload() {
        let normalized = normalize(200, Some("text/plain"), "service warming up").unwrap();
        assert_eq!(normalized.payload["message"], json!("service warming up"));
    }

    #[test]
    fn empty_body_becomes_empty_object() {
        let normalized = normalize(200, None, "").unwrap();
        assert_eq!(normalized.payload, json!({}));
        let normalized = normalize(200, Some("application/json"), "").unwrap();
        assert_eq!(normalized.payload, json!({}));
    }

    #[test]
    fn undeclared_json_text_is_still_parsed() {
        let normalized = normalize(200, None, r#"{"ok":true}"#).unwrap();
        assert_eq!(normalized.payload["ok"], json!(true));
    }
}
