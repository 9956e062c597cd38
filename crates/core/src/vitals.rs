//! Inbound vitals sample wire types.
//!
//! Producers publish either the raw sample object or an event envelope with
//! the sample nested under `payload`. [`extract_sample`] handles both shapes
//! so the pipeline needs a single code path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;

/// Subject / event name for inbound vitals samples.
pub const VITALS_RECORDED: &str = "patient.vitals.recorded";

/// A single vitals observation for one patient. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsSample {
    /// Stable patient identifier.
    pub patient_id: Uuid,
    /// Beats per minute (wire range 0-300).
    pub heart_rate: i64,
    /// SpO2 percentage (wire range 0-100).
    pub oxygen_saturation: i64,
    /// When the observation was taken.
    pub timestamp: DateTime<Utc>,
}

/// Extract a [`VitalsSample`] from a parsed message body.
///
/// If the value carries a nested `payload` object (envelope-wrapped
/// producer), the sample is read from there; otherwise the value itself is
/// treated as the sample.
pub fn extract_sample(value: &Value) -> Result<VitalsSample, CoreError> {
    let target = match value.get("payload") {
        Some(payload) if payload.is_object() => payload,
        _ => value,
    };

    serde_json::from_value(target.clone())
        .map_err(|e| CoreError::Malformed(format!("not a vitals sample: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> Value {
        serde_json::json!({
            "patient_id": "550e8400-e29b-41d4-a716-446655440000",
            "heart_rate": 72,
            "oxygen_saturation": 98,
            "timestamp": "2025-06-14T12:00:00Z"
        })
    }

    #[test]
    fn test_extract_raw_sample() {
        let sample = extract_sample(&sample_json()).unwrap();
        assert_eq!(sample.heart_rate, 72);
        assert_eq!(sample.oxygen_saturation, 98);
        assert_eq!(
            sample.patient_id,
            Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()
        );
    }

    #[test]
    fn test_extract_envelope_wrapped_sample() {
        let wrapped = serde_json::json!({
            "event_name": VITALS_RECORDED,
            "event_id": "650e8400-e29b-41d4-a716-446655440001",
            "timestamp": "2025-06-14T12:00:01Z",
            "payload": sample_json(),
        });
        let sample = extract_sample(&wrapped).unwrap();
        assert_eq!(sample.heart_rate, 72);
    }

    #[test]
    fn test_extract_non_object_payload_falls_back_to_root() {
        // `payload` present but not an object: the root is not a sample either.
        let value = serde_json::json!({ "payload": "oops" });
        assert!(extract_sample(&value).is_err());
    }

    #[test]
    fn test_extract_missing_fields() {
        let value = serde_json::json!({ "patient_id": "550e8400-e29b-41d4-a716-446655440000" });
        let err = extract_sample(&value).unwrap_err();
        assert!(err.to_string().contains("not a vitals sample"));
    }
}
