//! Outbound alert event wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::vitals::VitalsSample;

/// Subject / event name for raised alerts.
pub const ALERT_RAISED: &str = "patient.alert.raised";

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// One violated condition contributing to an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReason {
    /// Stable machine code, e.g. `HEART_RATE_HIGH`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// The vitals values that triggered the alert, copied into the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    pub heart_rate: i64,
    pub oxygen_saturation: i64,
    pub timestamp: DateTime<Utc>,
}

impl From<&VitalsSample> for VitalsSnapshot {
    fn from(sample: &VitalsSample) -> Self {
        Self {
            heart_rate: sample.heart_rate,
            oxygen_saturation: sample.oxygen_saturation,
            timestamp: sample.timestamp,
        }
    }
}

/// Alert event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub patient_id: Uuid,
    pub severity: Severity,
    pub reasons: Vec<AlertReason>,
    pub suggested_action: String,
    pub vitals_snapshot: VitalsSnapshot,
}

/// Envelope-wrapped alert event as published on the wire.
///
/// Each construction gets a fresh `event_id`: a republish after a negative
/// acknowledgement is a new logical event, never a reuse of the old identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub event_name: String,
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: AlertPayload,
}

impl AlertEvent {
    /// Build an alert event for one triggered decision.
    pub fn new(
        sample: &VitalsSample,
        severity: Severity,
        reasons: Vec<AlertReason>,
        suggested_action: String,
    ) -> Self {
        Self {
            event_name: ALERT_RAISED.to_string(),
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload: AlertPayload {
                patient_id: sample.patient_id,
                severity,
                reasons,
                suggested_action,
                vitals_snapshot: sample.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VitalsSample {
        VitalsSample {
            patient_id: Uuid::new_v4(),
            heart_rate: 140,
            oxygen_saturation: 91,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_alert_event_wire_shape() {
        let event = AlertEvent::new(
            &sample(),
            Severity::Medium,
            vec![AlertReason {
                code: "HEART_RATE_HIGH".to_string(),
                message: "heart rate above threshold".to_string(),
            }],
            "continue monitoring".to_string(),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_name"], ALERT_RAISED);
        assert_eq!(json["payload"]["severity"], "medium");
        assert_eq!(json["payload"]["reasons"][0]["code"], "HEART_RATE_HIGH");
        assert_eq!(json["payload"]["vitals_snapshot"]["heart_rate"], 140);
    }

    #[test]
    fn test_alert_event_fresh_identity() {
        let s = sample();
        let a = AlertEvent::new(&s, Severity::Low, vec![], "x".to_string());
        let b = AlertEvent::new(&s, Severity::Low, vec![], "x".to_string());
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn test_severity_ordering_and_display() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::High.to_string(), "high");
    }
}
