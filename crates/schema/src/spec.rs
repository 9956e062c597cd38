//! Schema spec format and per-field checks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Field kinds ─────────────────────────────────────────────────────

/// The JSON shape a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Uuid,
    Integer,
    Number,
    Boolean,
    Timestamp,
    Object,
    Array,
}

impl FieldKind {
    fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Uuid => "uuid",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        }
    }
}

// ── Field spec ──────────────────────────────────────────────────────

fn default_required() -> bool {
    true
}

/// Structural rule for a single field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, resolved against the validation target object.
    pub field: String,
    pub kind: FieldKind,
    /// Missing required fields fail validation; missing optional fields pass.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Inclusive numeric lower bound (integer/number kinds).
    #[serde(default)]
    pub min: Option<f64>,
    /// Inclusive numeric upper bound (integer/number kinds).
    #[serde(default)]
    pub max: Option<f64>,
    /// Allowed string values (string kind).
    #[serde(default)]
    pub values: Option<Vec<String>>,
    /// Minimum element count (array kind).
    #[serde(default)]
    pub min_items: Option<usize>,
}

impl FieldSpec {
    pub fn new(field: &str, kind: FieldKind) -> Self {
        Self {
            field: field.to_string(),
            kind,
            required: true,
            min: None,
            max: None,
            values: None,
            min_items: None,
        }
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.values = Some(values.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn at_least(mut self, min_items: usize) -> Self {
        self.min_items = Some(min_items);
        self
    }

    /// Check this field inside `target`, appending failures to `errors`.
    pub fn check(&self, target: &Value, errors: &mut Vec<String>) {
        let value = match target.get(&self.field) {
            Some(v) if !v.is_null() => v,
            _ => {
                if self.required {
                    errors.push(format!("missing required field '{}'", self.field));
                }
                return;
            }
        };

        match self.kind {
            FieldKind::String => {
                let Some(s) = value.as_str() else {
                    errors.push(self.kind_error(value));
                    return;
                };
                if let Some(allowed) = &self.values {
                    if !allowed.iter().any(|a| a == s) {
                        errors.push(format!(
                            "field '{}' must be one of [{}], got '{}'",
                            self.field,
                            allowed.join(", "),
                            s
                        ));
                    }
                }
            }
            FieldKind::Uuid => {
                let ok = value
                    .as_str()
                    .map(|s| uuid::Uuid::parse_str(s).is_ok())
                    .unwrap_or(false);
                if !ok {
                    errors.push(self.kind_error(value));
                }
            }
            FieldKind::Integer => {
                match value.as_i64() {
                    Some(i) => self.check_bounds(i as f64, errors),
                    None => errors.push(self.kind_error(value)),
                }
            }
            FieldKind::Number => {
                match value.as_f64() {
                    Some(f) => self.check_bounds(f, errors),
                    None => errors.push(self.kind_error(value)),
                }
            }
            FieldKind::Boolean => {
                if !value.is_boolean() {
                    errors.push(self.kind_error(value));
                }
            }
            FieldKind::Timestamp => {
                let ok = value
                    .as_str()
                    .map(|s| s.parse::<chrono::DateTime<chrono::Utc>>().is_ok())
                    .unwrap_or(false);
                if !ok {
                    errors.push(format!(
                        "field '{}' must be an ISO-8601 timestamp",
                        self.field
                    ));
                }
            }
            FieldKind::Object => {
                if !value.is_object() {
                    errors.push(self.kind_error(value));
                }
            }
            FieldKind::Array => {
                let Some(items) = value.as_array() else {
                    errors.push(self.kind_error(value));
                    return;
                };
                if let Some(min_items) = self.min_items {
                    if items.len() < min_items {
                        errors.push(format!(
                            "field '{}' must have at least {} item(s), got {}",
                            self.field,
                            min_items,
                            items.len()
                        ));
                    }
                }
            }
        }
    }

    fn check_bounds(&self, v: f64, errors: &mut Vec<String>) {
        if let Some(min) = self.min {
            if v < min {
                errors.push(format!("field '{}' below minimum {} (got {})", self.field, min, v));
            }
        }
        if let Some(max) = self.max {
            if v > max {
                errors.push(format!("field '{}' above maximum {} (got {})", self.field, max, v));
            }
        }
    }

    fn kind_error(&self, value: &Value) -> String {
        format!(
            "field '{}' must be a {}, got {}",
            self.field,
            self.kind.name(),
            json_type_name(value)
        )
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Envelope spec ───────────────────────────────────────────────────

/// Rules for the outer event envelope.
///
/// When the validated value carries an object `payload` field, the envelope
/// fields are checked against the root and the payload fields against the
/// nested object. A value without `payload` passes only if the envelope is
/// not required; the payload fields then apply to the root directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeSpec {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

// ── Schema spec ─────────────────────────────────────────────────────

/// A complete schema: optional envelope rules plus payload field rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSpec {
    #[serde(default)]
    pub envelope: Option<EnvelopeSpec>,
    pub fields: Vec<FieldSpec>,
}

impl SchemaSpec {
    /// Validate a value, returning all structural errors found.
    pub fn check(&self, value: &Value) -> Vec<String> {
        let mut errors = Vec::new();

        if !value.is_object() {
            errors.push(format!("payload must be a JSON object, got {}", json_type_name(value)));
            return errors;
        }

        let wrapped = value.get("payload").map(|p| p.is_object()).unwrap_or(false);

        let target = if wrapped {
            if let Some(envelope) = &self.envelope {
                for field in &envelope.fields {
                    field.check(value, &mut errors);
                }
            }
            &value["payload"]
        } else {
            if self.envelope.as_ref().map(|e| e.required).unwrap_or(false) {
                errors.push("missing required envelope field 'payload'".to_string());
                return errors;
            }
            value
        };

        for field in &self.fields {
            field.check(target, &mut errors);
        }

        errors
    }
}
