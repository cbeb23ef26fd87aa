//! # Sigil Schema — JSON Schema Validation Engine
//!
//! Validates JSON instances against JSON Schema documents across Drafts 4,
//! 7, and 2020-12, with structured, path-carrying errors.
//!
//! ## Architecture
//!
//! - [`dialect`] — draft bundles: keyword maps, type and format
//!   vocabularies, meta-schemas, and the process-wide dialect registry.
//! - [`keywords`] — one validation function per keyword.
//! - [`resolver`] — `$ref` resolution: scope stack, document registry,
//!   injected retrieval, session caches.
//! - [`validator`] — the dispatch engine and the [`Validator`] façade.
//! - [`error`] — [`ValidationError`] with absolute instance and schema
//!   paths, plus the fatal [`SigilError`] taxonomy.
//! - [`types`] / [`formats`] — extensible `type` and `format` checkers.
//!
//! ## Usage
//!
//! ```
//! use serde_json::json;
//! use sigil_schema::Validator;
//!
//! let validator = Validator::new(json!({
//!     "type": "object",
//!     "properties": {"count": {"type": "integer", "minimum": 0}},
//!     "required": ["count"]
//! }));
//! assert!(validator.is_valid(&json!({"count": 3})));
//!
//! for error in validator.iter_errors(&json!({"count": -1}))? {
//!     println!("{error}");
//! }
//! # Ok::<(), sigil_schema::SigilError>(())
//! ```
//!
//! Validation failures are data ([`ValidationError`]); the `Result` error
//! channel is reserved for conditions under which no verdict is possible:
//! an unresolvable reference or an unregistered type name.

pub mod dialect;
pub mod error;
pub mod formats;
pub mod keywords;
pub mod resolver;
pub mod types;
pub mod validator;

pub use dialect::{
    dialect_for_name, dialect_for_schema, dialect_for_spec_uri, register_dialect, Dialect,
    DialectBuilder, DRAFT202012_URI, DRAFT4_URI, DRAFT7_URI,
};
pub use error::{
    ErrorBuffer, ErrorSink, FirstFailure, SchemaError, SigilError, SigilResult, ValidationError,
    ValidationErrors,
};
pub use formats::{FormatChecker, FormatDependencyUnavailable, FormatPredicate};
pub use resolver::{DocumentRegistry, NoRetrieve, Retrieve};
pub use types::{TypeChecker, TypePredicate};
pub use validator::{Context, ValidationOptions, Validator};

use serde_json::Value;

/// One-shot boolean check with the dialect chosen by the schema's own
/// `$schema` declaration.
pub fn is_valid(schema: &Value, instance: &Value) -> bool {
    Validator::new(schema.clone()).is_valid(instance)
}

/// One-shot validation: checks the schema against its meta-schema first,
/// then surfaces the best-match instance failure.
///
/// # Errors
///
/// [`SigilError::Schema`] when the schema itself is invalid, or
/// [`SigilError::Validation`] carrying the most relevant instance failure.
pub fn validate(schema: &Value, instance: &Value) -> SigilResult<()> {
    let validator = Validator::new(schema.clone());
    validator.check_schema()?;
    validator.validate(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn one_shot_helpers_detect_the_dialect() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "type": "integer"
        });
        // 1.0 is an integer from Draft 6 on, but not in Draft 4.
        assert!(!is_valid(&schema, &json!(1.0)));
        let schema = json!({"type": "integer"});
        assert!(is_valid(&schema, &json!(1.0)));
    }

    #[test]
    fn one_shot_validate_checks_the_schema_first() {
        let err = validate(&json!({"type": 12}), &json!(1)).unwrap_err();
        assert!(matches!(err, SigilError::Schema(_)));
    }
}
