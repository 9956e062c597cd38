//! The threshold decision core.
//!
//! `evaluate` is deterministic over its inputs; its only side effect is the
//! per-patient counter update and last-updated touch in the injected
//! [`StateStore`]. The interface is deliberately narrow so the logic could
//! later be swapped for a learned model without touching the pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use vitalwatch_core::{AlertReason, Severity, VitalsSample};

use crate::rules::{RuleSet, ThresholdCheck, MULTI_VIOLATION_ACTION};
use crate::state::StateStore;

/// Outcome of evaluating one sample. Derived, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDecision {
    pub should_alert: bool,
    pub severity: Option<Severity>,
    /// Ordered by rule configuration order.
    pub reasons: Vec<AlertReason>,
    pub suggested_action: Option<String>,
}

impl AlertDecision {
    fn none() -> Self {
        Self {
            should_alert: false,
            severity: None,
            reasons: Vec::new(),
            suggested_action: None,
        }
    }
}

/// Stateful debounced threshold evaluator.
pub struct ThresholdEngine {
    rules: RuleSet,
    store: Arc<StateStore>,
}

impl ThresholdEngine {
    pub fn new(rules: RuleSet, store: Arc<StateStore>) -> Self {
        Self { rules, store }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Evaluate a sample against all configured checks.
    pub fn evaluate(&self, sample: &VitalsSample) -> AlertDecision {
        self.evaluate_at(sample, Utc::now())
    }

    /// Evaluation with an injected clock, used by the eviction tests.
    pub fn evaluate_at(&self, sample: &VitalsSample, now: DateTime<Utc>) -> AlertDecision {
        // Persisted violations for this sample: (check, observed value).
        let mut triggered: Vec<(&ThresholdCheck, f64)> = Vec::new();

        {
            let entry = self.store.get_or_create(sample.patient_id);
            let mut state = entry.lock().unwrap();
            state.last_updated = now;

            for check in self.rules.checks() {
                let value = check.kind.metric_value(sample);
                let counter = state.counters.entry(check.kind).or_insert(0);

                if check.is_violating(value) {
                    *counter += 1;
                    if *counter >= check.persist_samples {
                        triggered.push((check, value));
                    }
                } else {
                    *counter = 0;
                }
            }
        }

        if triggered.is_empty() {
            return AlertDecision::none();
        }

        let reasons = triggered
            .iter()
            .map(|(check, value)| AlertReason {
                code: check.kind.code().to_string(),
                message: check.kind.reason_message(*value, check.threshold),
            })
            .collect();

        // Two or more reasons escalate unconditionally; a single reason is
        // graded against that kind's critical and moderate cutoffs.
        let (severity, suggested_action) = if triggered.len() >= 2 {
            (Severity::High, MULTI_VIOLATION_ACTION.to_string())
        } else {
            let (check, value) = triggered[0];
            if check.crosses(value, check.critical_cutoff) {
                (Severity::High, check.kind.critical_action().to_string())
            } else if check.crosses(value, check.moderate_cutoff) {
                (Severity::Medium, check.kind.routine_action().to_string())
            } else {
                (Severity::Low, check.kind.routine_action().to_string())
            }
        };

        AlertDecision {
            should_alert: true,
            severity: Some(severity),
            reasons,
            suggested_action: Some(suggested_action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ViolationKind;
    use std::time::Duration;
    use uuid::Uuid;

    fn engine(rules_json: &str) -> ThresholdEngine {
        ThresholdEngine::new(
            RuleSet::from_json(rules_json).unwrap(),
            Arc::new(StateStore::new()),
        )
    }

    fn sample(patient_id: Uuid, heart_rate: i64, spo2: i64) -> VitalsSample {
        VitalsSample {
            patient_id,
            heart_rate,
            oxygen_saturation: spo2,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_scenario_a_persisted_heart_rate_low_severity() {
        let engine = engine(r#"{ "heart_rate": { "high_threshold": 120, "persist_samples": 2 } }"#);
        let p1 = Uuid::new_v4();

        let first = engine.evaluate(&sample(p1, 130, 98));
        assert!(!first.should_alert);

        let second = engine.evaluate(&sample(p1, 130, 98));
        assert!(second.should_alert);
        assert_eq!(second.reasons.len(), 1);
        assert_eq!(second.reasons[0].code, "HEART_RATE_HIGH");
        // 130 exceeds 120 but not the moderate cutoff of >130.
        assert_eq!(second.severity, Some(Severity::Low));
        assert_eq!(
            second.suggested_action.as_deref(),
            Some("Heart rate elevated, continue routine monitoring")
        );
    }

    #[test]
    fn test_scenario_b_spo2_critical_immediate_high() {
        let engine = engine(r#"{ "spo2": { "low_threshold": 90, "persist_samples": 1 } }"#);
        let decision = engine.evaluate(&sample(Uuid::new_v4(), 70, 80));

        assert!(decision.should_alert);
        assert_eq!(decision.reasons[0].code, "SPO2_LOW");
        // 80 is below the critical cutoff of 85.
        assert_eq!(decision.severity, Some(Severity::High));
        assert_eq!(
            decision.suggested_action.as_deref(),
            Some("Oxygen saturation critically low, check airway and notify clinician immediately")
        );
    }

    #[test]
    fn test_scenario_c_multiple_reasons_always_high() {
        let engine = engine(
            r#"{
                "heart_rate": { "high_threshold": 120, "persist_samples": 2 },
                "spo2": { "low_threshold": 90, "persist_samples": 2 }
            }"#,
        );
        let p1 = Uuid::new_v4();

        // Both magnitudes are mild: 121 and 89 cross no cutoffs.
        assert!(!engine.evaluate(&sample(p1, 121, 89)).should_alert);
        let decision = engine.evaluate(&sample(p1, 121, 89));

        assert!(decision.should_alert);
        assert_eq!(decision.reasons.len(), 2);
        assert_eq!(decision.severity, Some(Severity::High));
        assert_eq!(decision.suggested_action.as_deref(), Some(MULTI_VIOLATION_ACTION));
    }

    #[test]
    fn test_persist_streak_property_and_reset() {
        let persist = 4;
        let engine = engine(r#"{ "spo2": { "low_threshold": 90, "persist_samples": 4 } }"#);
        let p1 = Uuid::new_v4();

        for i in 1..persist {
            let decision = engine.evaluate(&sample(p1, 70, 85));
            assert!(!decision.should_alert, "sample {i} must not alert");
        }
        assert!(engine.evaluate(&sample(p1, 70, 85)).should_alert);
        // Every violating sample after the Nth keeps alerting.
        assert!(engine.evaluate(&sample(p1, 70, 85)).should_alert);

        // A non-violating sample resets the streak to exactly zero.
        assert!(!engine.evaluate(&sample(p1, 70, 95)).should_alert);
        let entry = engine.store().get_or_create(p1);
        assert_eq!(entry.lock().unwrap().counter(ViolationKind::Spo2Low), 0);
        drop(entry);

        for _ in 1..persist {
            assert!(!engine.evaluate(&sample(p1, 70, 85)).should_alert);
        }
        assert!(engine.evaluate(&sample(p1, 70, 85)).should_alert);
    }

    #[test]
    fn test_violation_kinds_are_independent() {
        let engine = engine(
            r#"{ "heart_rate": { "high_threshold": 120, "low_threshold": 50, "persist_samples": 3 } }"#,
        );
        let p1 = Uuid::new_v4();

        engine.evaluate(&sample(p1, 130, 98));
        engine.evaluate(&sample(p1, 130, 98));
        // A low reading resets the high streak (the high condition no longer
        // holds) but counts only toward the low streak.
        engine.evaluate(&sample(p1, 40, 98));

        let entry = engine.store().get_or_create(p1);
        let state = entry.lock().unwrap();
        assert_eq!(state.counter(ViolationKind::HeartRateHigh), 0);
        assert_eq!(state.counter(ViolationKind::HeartRateLow), 1);
    }

    #[test]
    fn test_severity_grading_single_reason() {
        let engine = engine(r#"{ "heart_rate": { "high_threshold": 120 } }"#);

        let low = engine.evaluate(&sample(Uuid::new_v4(), 125, 98));
        assert_eq!(low.severity, Some(Severity::Low));

        let medium = engine.evaluate(&sample(Uuid::new_v4(), 140, 98));
        assert_eq!(medium.severity, Some(Severity::Medium));
        assert_eq!(
            medium.suggested_action.as_deref(),
            Some("Heart rate elevated, continue routine monitoring")
        );

        let high = engine.evaluate(&sample(Uuid::new_v4(), 160, 98));
        assert_eq!(high.severity, Some(Severity::High));
        assert_eq!(
            high.suggested_action.as_deref(),
            Some("Heart rate critically elevated, notify clinician immediately")
        );
    }

    #[test]
    fn test_no_rules_never_alerts() {
        let engine = engine("{}");
        let decision = engine.evaluate(&sample(Uuid::new_v4(), 300, 1));
        assert!(!decision.should_alert);
        assert!(decision.severity.is_none());
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn test_entity_ttl_eviction_via_evaluate() {
        // Clock injected through evaluate_at; sweeps fire on the periodic
        // schedule (period == ttl), so the entity survives the t=1000
        // sweep and is evicted by the t=2000 one.
        let engine = engine(r#"{ "spo2": { "low_threshold": 90 } }"#);
        let p1 = Uuid::new_v4();
        let t0 = DateTime::<Utc>::from_timestamp_millis(0).unwrap();
        let ttl = Duration::from_millis(1000);

        engine.evaluate_at(&sample(p1, 70, 95), t0);
        let store = engine.store();

        store.sweep(DateTime::<Utc>::from_timestamp_millis(1000).unwrap(), ttl);
        assert_eq!(store.tracked(), 1);
        store.sweep(DateTime::<Utc>::from_timestamp_millis(2000).unwrap(), ttl);
        assert_eq!(store.tracked(), 0);
    }

    #[test]
    fn test_concurrent_same_patient_loses_no_increments() {
        let engine = Arc::new(engine(
            r#"{ "spo2": { "low_threshold": 90, "persist_samples": 1000 } }"#,
        ));
        let p1 = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        engine.evaluate(&sample(p1, 70, 85));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let entry = engine.store().get_or_create(p1);
        assert_eq!(entry.lock().unwrap().counter(ViolationKind::Spo2Low), 400);
    }
}
