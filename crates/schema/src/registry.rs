//! Schema registry: id → spec, loaded from disk with built-in defaults.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::spec::{EnvelopeSpec, FieldKind, FieldSpec, SchemaSpec};
use crate::{SchemaError, Validation, Validator};

/// Schema id for inbound vitals samples.
pub const VITALS_RECORDED: &str = "patient.vitals.recorded";
/// Schema id for outbound alert events.
pub const ALERT_RAISED: &str = "patient.alert.raised";

/// In-memory schema repository keyed by stable identifier.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: HashMap<String, SchemaSpec>,
}

impl SchemaRegistry {
    /// Registry with the built-in schemas for the two wire formats.
    pub fn defaults() -> Self {
        let mut schemas = HashMap::new();
        schemas.insert(VITALS_RECORDED.to_string(), vitals_recorded_spec());
        schemas.insert(ALERT_RAISED.to_string(), alert_raised_spec());
        Self { schemas }
    }

    /// Load `<schema_id>.json` files from a directory, over the defaults.
    ///
    /// Files replace the built-in spec of the same id. A malformed file is
    /// a startup error, not a skipped schema.
    pub fn load_dir(dir: &Path) -> Result<Self, SchemaError> {
        let mut registry = Self::defaults();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let raw = std::fs::read_to_string(&path)?;
            let spec: SchemaSpec = serde_json::from_str(&raw).map_err(|source| {
                SchemaError::Parse { file: path.display().to_string(), source }
            })?;

            info!(schema_id = %id, file = %path.display(), "Loaded schema");
            registry.schemas.insert(id.to_string(), spec);
        }

        Ok(registry)
    }

    /// Load from `dir` when it exists, otherwise fall back to the defaults.
    pub fn load_or_defaults(dir: &Path) -> Result<Self, SchemaError> {
        if dir.is_dir() {
            Self::load_dir(dir)
        } else {
            warn!(dir = %dir.display(), "Schema directory missing, using built-in schemas");
            Ok(Self::defaults())
        }
    }

    pub fn schema_ids(&self) -> Vec<&str> {
        self.schemas.keys().map(|k| k.as_str()).collect()
    }
}

impl Validator for SchemaRegistry {
    fn validate(&self, schema_id: &str, value: &Value) -> Validation {
        let Some(spec) = self.schemas.get(schema_id) else {
            return Validation::fail(vec![format!("unknown schema '{schema_id}'")]);
        };

        let errors = spec.check(value);
        if errors.is_empty() {
            Validation::ok()
        } else {
            Validation::fail(errors)
        }
    }
}

// ── Built-in schemas ────────────────────────────────────────────────

fn vitals_recorded_spec() -> SchemaSpec {
    SchemaSpec {
        // Producers may send the sample raw or envelope-wrapped.
        envelope: Some(EnvelopeSpec {
            required: false,
            fields: vec![
                FieldSpec::new("event_name", FieldKind::String),
                FieldSpec::new("event_id", FieldKind::String),
                FieldSpec::new("timestamp", FieldKind::Timestamp),
            ],
        }),
        fields: vec![
            FieldSpec::new("patient_id", FieldKind::Uuid),
            FieldSpec::new("heart_rate", FieldKind::Integer).range(0.0, 300.0),
            FieldSpec::new("oxygen_saturation", FieldKind::Integer).range(0.0, 100.0),
            FieldSpec::new("timestamp", FieldKind::Timestamp),
        ],
    }
}

fn alert_raised_spec() -> SchemaSpec {
    SchemaSpec {
        envelope: Some(EnvelopeSpec {
            required: true,
            fields: vec![
                FieldSpec::new("event_name", FieldKind::String).one_of(&[ALERT_RAISED]),
                FieldSpec::new("event_id", FieldKind::Uuid),
                FieldSpec::new("timestamp", FieldKind::Timestamp),
            ],
        }),
        fields: vec![
            FieldSpec::new("patient_id", FieldKind::Uuid),
            FieldSpec::new("severity", FieldKind::String).one_of(&["low", "medium", "high"]),
            FieldSpec::new("reasons", FieldKind::Array).at_least(1),
            FieldSpec::new("suggested_action", FieldKind::String),
            FieldSpec::new("vitals_snapshot", FieldKind::Object),
        ],
    }
}
