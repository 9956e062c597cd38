//! Structural payload validation against a schema registry.
//!
//! Schemas are keyed by stable identifier strings (the event names) and
//! loaded from a directory of `<schema_id>.json` files at startup, with
//! built-in defaults for the two wire formats the service speaks. The
//! checks are plain field-by-field structural rules, not a full JSON
//! Schema dialect.

pub mod registry;
pub mod spec;

pub use registry::SchemaRegistry;
pub use spec::{EnvelopeSpec, FieldKind, FieldSpec, SchemaSpec};

use serde_json::Value;

/// Outcome of validating one value against one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self { valid: true, errors: Vec::new() }
    }

    pub fn fail(errors: Vec<String>) -> Self {
        Self { valid: false, errors }
    }
}

/// Stateless structural validator, keyed by schema identifier.
pub trait Validator: Send + Sync {
    /// Validate `value` against the schema registered under `schema_id`.
    ///
    /// An unknown `schema_id` is a validation failure, not a panic: the
    /// caller treats it like any other structurally invalid payload.
    fn validate(&self, schema_id: &str, value: &Value) -> Validation;
}

/// Errors raised while loading schemas, not while validating.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema parse error in {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },
}
