//! JSON Schema validation of devcontainer.json documents.
//!
//! The base schema ships with the crate. Every entry point returns a plain
//! outcome; malformed JSON and schema violations are both reported as
//! invalid rather than as errors.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde_json::Value;

/// Static schema artifact
pub const BASE_SCHEMA_JSON: &str = include_str!("../schemas/devContainer.base.schema.json");

static BASE_SCHEMA: LazyLock<Option<Value>> =
    LazyLock::new(|| serde_json::from_str(BASE_SCHEMA_JSON).ok());

static BASE_VALIDATOR: LazyLock<Option<Validator>> = LazyLock::new(|| {
    let schema = BASE_SCHEMA.as_ref()?;
    match jsonschema::validator_for(schema) {
        Ok(validator) => Some(validator),
        Err(e) => {
            tracing::error!(error = %e, "base devcontainer schema does not compile");
            None
        }
    }
});

/// Pass/fail plus the reasons for a failure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    fn fail(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
        }
    }

    /// Errors joined on one line, for logs and retry messages
    #[must_use]
    pub fn summary(&self) -> String {
        self.errors.join("; ")
    }
}

/// The parsed base schema, if the artifact is well-formed
#[must_use]
pub fn base_schema() -> Option<&'static Value> {
    BASE_SCHEMA.as_ref()
}

/// Validate `document_json` against the base schema with error details.
#[must_use]
pub fn check_devcontainer(document_json: &str) -> ValidationOutcome {
    let Some(validator) = BASE_VALIDATOR.as_ref() else {
        return ValidationOutcome::fail("base schema unavailable");
    };
    let instance: Value = match serde_json::from_str(document_json) {
        Ok(value) => value,
        Err(e) => return ValidationOutcome::fail(format!("invalid JSON: {e}")),
    };

    let errors: Vec<String> = validator
        .iter_errors(&instance)
        .map(|e| e.to_string())
        .collect();

    ValidationOutcome {
        valid: errors.is_empty(),
        errors,
    }
}

/// Validate `document_json` against the base schema.
#[must_use]
pub fn validate_devcontainer(document_json: &str) -> bool {
    check_devcontainer(document_json).valid
}

/// Validate `document_json` against an arbitrary schema.
///
/// A schema that does not compile counts as a failed validation.
#[must_use]
pub fn validate_against(document_json: &str, schema: &Value) -> bool {
    let Ok(instance) = serde_json::from_str::<Value>(document_json) else {
        return false;
    };
    match jsonschema::validator_for(schema) {
        Ok(validator) => validator.is_valid(&instance),
        Err(e) => {
            tracing::warn!(error = %e, "schema does not compile");
            false
        }
    }
}
