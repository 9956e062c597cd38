//! Threshold rule configuration.
//!
//! Loaded once at startup from a JSON file keyed by metric name; any absent
//! section or threshold disables that check. The file is compiled into a
//! flat list of [`ThresholdCheck`]s, one per violation kind, so the engine
//! never re-inspects the raw config shape.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use vitalwatch_core::VitalsSample;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rule parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid rule: {0}")]
    Invalid(String),
}

// ── Violation kinds ─────────────────────────────────────────────────

/// Which side of a threshold a check watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Above,
    Below,
}

/// One independently counted violation condition.
///
/// Kinds sharing a metric (heart-rate-high vs heart-rate-low) never
/// interact: each keeps its own streak counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    HeartRateHigh,
    HeartRateLow,
    Spo2Low,
}

impl ViolationKind {
    /// Stable wire code for alert reasons.
    pub fn code(&self) -> &'static str {
        match self {
            ViolationKind::HeartRateHigh => "HEART_RATE_HIGH",
            ViolationKind::HeartRateLow => "HEART_RATE_LOW",
            ViolationKind::Spo2Low => "SPO2_LOW",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            ViolationKind::HeartRateHigh => Direction::Above,
            ViolationKind::HeartRateLow | ViolationKind::Spo2Low => Direction::Below,
        }
    }

    /// The metric this kind observes, as a float for threshold comparison.
    pub fn metric_value(&self, sample: &VitalsSample) -> f64 {
        match self {
            ViolationKind::HeartRateHigh | ViolationKind::HeartRateLow => sample.heart_rate as f64,
            ViolationKind::Spo2Low => sample.oxygen_saturation as f64,
        }
    }

    /// Reason message for a persisted violation.
    pub fn reason_message(&self, value: f64, threshold: f64) -> String {
        match self.direction() {
            Direction::Above => format!("{} {} above threshold {}", self.metric_name(), value, threshold),
            Direction::Below => format!("{} {} below threshold {}", self.metric_name(), value, threshold),
        }
    }

    fn metric_name(&self) -> &'static str {
        match self {
            ViolationKind::HeartRateHigh | ViolationKind::HeartRateLow => "heart rate",
            ViolationKind::Spo2Low => "oxygen saturation",
        }
    }

    /// Suggested action when the critical cutoff is crossed.
    pub fn critical_action(&self) -> &'static str {
        match self {
            ViolationKind::HeartRateHigh => "Heart rate critically elevated, notify clinician immediately",
            ViolationKind::HeartRateLow => "Heart rate critically low, notify clinician immediately",
            ViolationKind::Spo2Low => "Oxygen saturation critically low, check airway and notify clinician immediately",
        }
    }

    /// Suggested action below the critical cutoff.
    pub fn routine_action(&self) -> &'static str {
        match self {
            ViolationKind::HeartRateHigh => "Heart rate elevated, continue routine monitoring",
            ViolationKind::HeartRateLow => "Heart rate below target, continue routine monitoring",
            ViolationKind::Spo2Low => "Oxygen saturation below target, continue routine monitoring",
        }
    }
}

/// Suggested action when more than one violation kind fires at once.
pub const MULTI_VIOLATION_ACTION: &str = "Multiple vitals abnormal, escalate immediately";

// ── Compiled checks ─────────────────────────────────────────────────

/// A fully resolved check: threshold, persistence, severity cutoffs.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCheck {
    pub kind: ViolationKind,
    pub threshold: f64,
    /// Consecutive violating samples required before a reason is emitted.
    pub persist_samples: u32,
    /// Crossing this cutoff makes a single-reason alert `high`.
    pub critical_cutoff: f64,
    /// Crossing this cutoff (but not the critical one) makes it `medium`.
    pub moderate_cutoff: f64,
}

impl ThresholdCheck {
    /// Whether `value` violates the configured threshold.
    pub fn is_violating(&self, value: f64) -> bool {
        self.crosses(value, self.threshold)
    }

    /// Directional comparison used for both the threshold and the cutoffs.
    pub fn crosses(&self, value: f64, cutoff: f64) -> bool {
        match self.kind.direction() {
            Direction::Above => value > cutoff,
            Direction::Below => value < cutoff,
        }
    }
}

// ── Rule file (wire shape) ──────────────────────────────────────────

mod defaults {
    pub const HR_HIGH_CRITICAL: f64 = 150.0;
    pub const HR_HIGH_MODERATE: f64 = 130.0;
    pub const HR_LOW_CRITICAL: f64 = 40.0;
    pub const HR_LOW_MODERATE: f64 = 45.0;
    pub const SPO2_LOW_CRITICAL: f64 = 85.0;
    pub const SPO2_LOW_MODERATE: f64 = 88.0;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartRateRule {
    #[serde(default)]
    pub high_threshold: Option<f64>,
    #[serde(default)]
    pub low_threshold: Option<f64>,
    #[serde(default)]
    pub persist_samples: Option<u32>,
    #[serde(default)]
    pub high_critical_cutoff: Option<f64>,
    #[serde(default)]
    pub high_moderate_cutoff: Option<f64>,
    #[serde(default)]
    pub low_critical_cutoff: Option<f64>,
    #[serde(default)]
    pub low_moderate_cutoff: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Spo2Rule {
    #[serde(default)]
    pub low_threshold: Option<f64>,
    #[serde(default)]
    pub persist_samples: Option<u32>,
    #[serde(default)]
    pub critical_cutoff: Option<f64>,
    #[serde(default)]
    pub moderate_cutoff: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub heart_rate: Option<HeartRateRule>,
    #[serde(default)]
    pub spo2: Option<Spo2Rule>,
}

// ── RuleSet ─────────────────────────────────────────────────────────

/// Immutable, compiled set of threshold checks for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    checks: Vec<ThresholdCheck>,
}

impl RuleSet {
    /// Read and compile a JSON rule file.
    pub fn from_path(path: &Path) -> Result<Self, RuleError> {
        let raw = std::fs::read_to_string(path)?;
        let set = Self::from_json(&raw)?;
        info!(
            file = %path.display(),
            checks = set.checks.len(),
            "Rule set loaded"
        );
        Ok(set)
    }

    /// Compile a rule set from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, RuleError> {
        let file: RuleFile = serde_json::from_str(raw)?;
        Self::compile(&file)
    }

    fn compile(file: &RuleFile) -> Result<Self, RuleError> {
        let mut checks = Vec::new();

        if let Some(hr) = &file.heart_rate {
            let persist = validated_persist(hr.persist_samples, "heart_rate")?;
            if let (Some(high), Some(low)) = (hr.high_threshold, hr.low_threshold) {
                if high <= low {
                    return Err(RuleError::Invalid(format!(
                        "heart_rate high_threshold ({high}) must exceed low_threshold ({low})"
                    )));
                }
            }
            if let Some(threshold) = hr.high_threshold {
                checks.push(ThresholdCheck {
                    kind: ViolationKind::HeartRateHigh,
                    threshold,
                    persist_samples: persist,
                    critical_cutoff: hr.high_critical_cutoff.unwrap_or(defaults::HR_HIGH_CRITICAL),
                    moderate_cutoff: hr.high_moderate_cutoff.unwrap_or(defaults::HR_HIGH_MODERATE),
                });
            }
            if let Some(threshold) = hr.low_threshold {
                checks.push(ThresholdCheck {
                    kind: ViolationKind::HeartRateLow,
                    threshold,
                    persist_samples: persist,
                    critical_cutoff: hr.low_critical_cutoff.unwrap_or(defaults::HR_LOW_CRITICAL),
                    moderate_cutoff: hr.low_moderate_cutoff.unwrap_or(defaults::HR_LOW_MODERATE),
                });
            }
        }

        if let Some(spo2) = &file.spo2 {
            let persist = validated_persist(spo2.persist_samples, "spo2")?;
            if let Some(threshold) = spo2.low_threshold {
                checks.push(ThresholdCheck {
                    kind: ViolationKind::Spo2Low,
                    threshold,
                    persist_samples: persist,
                    critical_cutoff: spo2.critical_cutoff.unwrap_or(defaults::SPO2_LOW_CRITICAL),
                    moderate_cutoff: spo2.moderate_cutoff.unwrap_or(defaults::SPO2_LOW_MODERATE),
                });
            }
        }

        Ok(Self { checks })
    }

    pub fn checks(&self) -> &[ThresholdCheck] {
        &self.checks
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

fn validated_persist(persist: Option<u32>, metric: &str) -> Result<u32, RuleError> {
    match persist {
        Some(0) => Err(RuleError::Invalid(format!(
            "{metric} persist_samples must be at least 1"
        ))),
        Some(n) => Ok(n),
        None => Ok(1),
    }
}
