//! # Error Model — Structured Validation Failures
//!
//! Defines the failure taxonomy of the engine:
//!
//! - [`ValidationError`] — an instance failed a schema constraint. Ordinary,
//!   reportable, never fatal to the surrounding process.
//! - [`SchemaError`] — the schema itself does not conform to its dialect's
//!   meta-schema. Reported only by `check_schema`, orthogonal to instance
//!   validation.
//! - [`SigilError::UnknownType`] / [`SigilError::UnresolvableReference`] —
//!   configuration and resolution failures. Fail-fast: they abort the
//!   validation call instead of joining the error stream.
//!
//! Every `ValidationError` carries two absolute pointer paths: one from the
//! root instance to the failing sub-value, one from the root schema to the
//! keyword that rejected it. Paths are prepended segment-by-segment as the
//! error propagates out of the recursion, including into nested `context`
//! errors, so both invariants hold at every level of the tree.

use std::fmt;
use std::ops::ControlFlow;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use sigil_core::{JsonPointer, PathChunk};

/// Result alias for engine operations that can hit fatal conditions.
pub type SigilResult<T> = Result<T, SigilError>;

/// Top-level error type for the Sigil engine.
#[derive(Debug, Error)]
pub enum SigilError {
    /// An instance failed validation (`validate` surfaces the best match).
    #[error(transparent)]
    Validation(Box<ValidationError>),

    /// The schema does not conform to its dialect's meta-schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A `type` keyword or caller referenced an unregistered type name.
    /// This is a configuration error, surfaced immediately.
    #[error("unknown type {name:?} is not registered with this type checker")]
    UnknownType {
        /// The unregistered type name.
        name: String,
    },

    /// A reference could not be resolved to a schema. Fatal for the
    /// surrounding validation call: the constraint behind the reference
    /// is unknown, so no verdict is possible.
    #[error("unresolvable reference {reference:?}: {reason}")]
    UnresolvableReference {
        /// The reference as written in the schema.
        reference: String,
        /// Why resolution failed.
        reason: String,
    },
}

impl From<ValidationError> for SigilError {
    fn from(error: ValidationError) -> Self {
        SigilError::Validation(Box::new(error))
    }
}

/// A single validation failure with full positional context.
///
/// Equality is structural over every field; there is no parent
/// back-reference — an enclosing combinator failure owns its sub-failures
/// through [`context`](Self::context), and both paths are already absolute.
/// Serializes with both paths in RFC 6901 text, for machine-readable
/// validation reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    message: String,
    keyword: Option<String>,
    keyword_value: Option<Value>,
    instance: Option<Value>,
    schema: Option<Value>,
    instance_path: JsonPointer,
    schema_path: JsonPointer,
    context: Vec<ValidationError>,
}

impl ValidationError {
    /// Create a failure with the given message. Positional fields are
    /// attributed by the dispatch machinery as the error propagates.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            keyword: None,
            keyword_value: None,
            instance: None,
            schema: None,
            instance_path: JsonPointer::root(),
            schema_path: JsonPointer::root(),
            context: Vec::new(),
        }
    }

    /// Attach sub-failures collected by a combinator keyword.
    pub fn with_context(mut self, context: Vec<ValidationError>) -> Self {
        self.context = context;
        self
    }

    /// Human-readable description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The keyword that rejected the instance (e.g. `"maxItems"`).
    pub fn keyword(&self) -> &str {
        self.keyword.as_deref().unwrap_or("")
    }

    /// The value of the rejecting keyword in the schema.
    pub fn keyword_value(&self) -> Option<&Value> {
        self.keyword_value.as_ref()
    }

    /// The sub-instance that failed.
    pub fn instance(&self) -> Option<&Value> {
        self.instance.as_ref()
    }

    /// The schema object containing the rejecting keyword.
    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    /// Absolute path from the root instance to the failing sub-value.
    pub fn instance_path(&self) -> &JsonPointer {
        &self.instance_path
    }

    /// Absolute path from the root schema to the rejecting keyword.
    pub fn schema_path(&self) -> &JsonPointer {
        &self.schema_path
    }

    /// Sub-failures, populated only by combinator keywords
    /// (`anyOf`, `oneOf`).
    pub fn context(&self) -> &[ValidationError] {
        &self.context
    }

    /// Depth of nested context: 0 for a leaf failure, 1 + max child depth
    /// for a combinator failure. Used by best-match selection.
    pub fn context_depth(&self) -> usize {
        self.context
            .iter()
            .map(|e| 1 + e.context_depth())
            .max()
            .unwrap_or(0)
    }

    /// Fill attribution fields that are still unset. An error propagating
    /// through several dispatch levels keeps the attribution of the keyword
    /// that created it.
    pub(crate) fn attribute(
        &mut self,
        keyword: &str,
        keyword_value: &Value,
        instance: &Value,
        schema: &Value,
    ) {
        if self.keyword.is_none() {
            self.keyword = Some(keyword.to_owned());
        }
        if self.keyword_value.is_none() {
            self.keyword_value = Some(keyword_value.clone());
        }
        if self.instance.is_none() {
            self.instance = Some(instance.clone());
        }
        if self.schema.is_none() {
            self.schema = Some(schema.clone());
        }
    }

    /// Prepend an instance-path segment, recursing into context errors so
    /// their paths stay absolute.
    pub(crate) fn prepend_instance_chunk(&mut self, chunk: &PathChunk) {
        self.instance_path.push_front(chunk.clone());
        for child in &mut self.context {
            child.prepend_instance_chunk(chunk);
        }
    }

    /// Prepend a schema-path segment, recursing into context errors.
    pub(crate) fn prepend_schema_chunk(&mut self, chunk: &PathChunk) {
        self.schema_path.push_front(chunk.clone());
        for child in &mut self.context {
            child.prepend_schema_chunk(chunk);
        }
    }
}

impl fmt::Display for ValidationError {
    /// `<instance path>: <message>`, with `(root)` standing in for the
    /// empty path. Deterministic, one line, snapshot-safe.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Exhaustive, re-iterable collection of validation failures.
///
/// Produced by `Validator::iter_errors`. Re-running `iter_errors` re-runs
/// validation and yields an equal collection — this is a value, not a
/// single-use cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Number of failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when the instance was valid.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// All failures in emission order.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Iterate failures in emission order.
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }

    /// Consume self and return the inner Vec.
    pub fn into_inner(self) -> Vec<ValidationError> {
        self.errors
    }

    /// The single most specific failure, for one-error reporting.
    ///
    /// Policy: shallowest context nesting first (leaf failures beat
    /// combinator roll-ups), then longest absolute schema path (more
    /// specific keyword beats more generic), ties broken by emission
    /// order. Once a winner is chosen, selection recurses into its
    /// context so a combinator roll-up yields its most telling branch
    /// failure rather than the summary.
    pub fn best_match(&self) -> Option<&ValidationError> {
        let mut best = best_of(self.errors.iter())?;
        while let Some(inner) = best_of(best.context().iter()) {
            best = inner;
        }
        Some(best)
    }
}

fn best_of<'e>(
    candidates: impl Iterator<Item = &'e ValidationError>,
) -> Option<&'e ValidationError> {
    use std::cmp::Reverse;
    let rank = |e: &ValidationError| (e.context_depth(), Reverse(e.schema_path().len()));
    let mut best: Option<&ValidationError> = None;
    for candidate in candidates {
        best = match best {
            None => Some(candidate),
            // Strict comparison keeps the earlier error on ties.
            Some(current) if rank(candidate) < rank(current) => Some(candidate),
            Some(current) => Some(current),
        };
    }
    best
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// The bound schema does not conform to its dialect's meta-schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    errors: ValidationErrors,
}

impl SchemaError {
    pub(crate) fn new(errors: ValidationErrors) -> Self {
        Self { errors }
    }

    /// Every meta-validation failure.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// The most specific meta-validation failure.
    pub fn best_match(&self) -> Option<&ValidationError> {
        self.errors.best_match()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.best_match() {
            Some(error) => write!(f, "schema is invalid: {}", error.message()),
            None => write!(f, "schema is invalid"),
        }
    }
}

impl std::error::Error for SchemaError {}

/// Receiver for the streaming validation surface.
///
/// The engine pushes each failure into the sink as it is found; returning
/// [`ControlFlow::Break`] halts traversal. Resolution-scope frames unwind
/// on the Rust call stack, so an early halt releases them on every path.
pub trait ErrorSink {
    /// Accept one failure; `Break` stops further validation work.
    fn report(&mut self, error: ValidationError) -> ControlFlow<()>;
}

/// Sink that collects every failure (exhaustive mode).
#[derive(Debug, Default)]
pub struct ErrorBuffer {
    errors: Vec<ValidationError>,
}

impl ErrorBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume into the collected failures.
    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}

impl ErrorSink for ErrorBuffer {
    fn report(&mut self, error: ValidationError) -> ControlFlow<()> {
        self.errors.push(error);
        ControlFlow::Continue(())
    }
}

/// Sink that records whether any failure occurred and halts immediately
/// (the `is_valid` fast path — the full sequence is never materialized).
#[derive(Debug, Default)]
pub struct FirstFailure {
    failed: bool,
}

impl FirstFailure {
    /// Fresh, not-yet-failed sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any failure has been reported.
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl ErrorSink for FirstFailure {
    fn report(&mut self, _error: ValidationError) -> ControlFlow<()> {
        self.failed = true;
        ControlFlow::Break(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(message: &str, schema_path: &[&str]) -> ValidationError {
        let mut error = ValidationError::new(message);
        for chunk in schema_path.iter().rev() {
            error.prepend_schema_chunk(&PathChunk::Property((*chunk).to_owned()));
        }
        error
    }

    #[test]
    fn attribution_fills_only_unset_fields() {
        let mut error = ValidationError::new("boom");
        error.attribute("maxItems", &json!(2), &json!([1, 2, 3]), &json!({"maxItems": 2}));
        // A second dispatch level must not overwrite the original keyword.
        error.attribute("properties", &json!({}), &json!({"a": [1, 2, 3]}), &json!({}));
        assert_eq!(error.keyword(), "maxItems");
        assert_eq!(error.instance(), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn path_prepending_recurses_into_context() {
        let child = leaf("child", &["type"]);
        let mut parent = ValidationError::new("parent").with_context(vec![child]);
        parent.prepend_schema_chunk(&PathChunk::Property("anyOf".into()));
        parent.prepend_instance_chunk(&PathChunk::Property("field".into()));
        assert_eq!(parent.schema_path().to_string(), "/anyOf");
        assert_eq!(parent.context()[0].schema_path().to_string(), "/anyOf/type");
        assert_eq!(parent.context()[0].instance_path().to_string(), "/field");
    }

    #[test]
    fn context_depth_counts_nesting() {
        let grandchild = leaf("g", &[]);
        let child = ValidationError::new("c").with_context(vec![grandchild]);
        let parent = ValidationError::new("p").with_context(vec![child]);
        assert_eq!(parent.context_depth(), 2);
        assert_eq!(leaf("l", &[]).context_depth(), 0);
    }

    #[test]
    fn best_match_prefers_leaf_over_combinator() {
        let combinator = ValidationError::new("not valid under any schema")
            .with_context(vec![leaf("sub", &["0", "type"])]);
        let specific = leaf("too long", &["properties", "a", "maxItems"]);
        let errors = ValidationErrors::from(vec![combinator, specific.clone()]);
        assert_eq!(errors.best_match(), Some(&specific));
    }

    #[test]
    fn best_match_descends_into_the_winning_context() {
        let deep = leaf("branch failure", &["1", "properties", "n", "type"]);
        let shallow = leaf("other branch", &["0", "type"]);
        let combinator = ValidationError::new("not valid under any schema")
            .with_context(vec![shallow, deep.clone()]);
        let errors = ValidationErrors::from(vec![combinator]);
        assert_eq!(errors.best_match(), Some(&deep));
    }

    #[test]
    fn best_match_prefers_longer_schema_path() {
        let shallow = leaf("shallow", &["type"]);
        let deep = leaf("deep", &["properties", "a", "type"]);
        let errors = ValidationErrors::from(vec![shallow, deep.clone()]);
        assert_eq!(errors.best_match(), Some(&deep));
    }

    #[test]
    fn best_match_ties_break_on_emission_order() {
        let first = leaf("first", &["type"]);
        let second = leaf("second", &["enum"]);
        let errors = ValidationErrors::from(vec![first.clone(), second]);
        assert_eq!(errors.best_match().map(ValidationError::message), Some("first"));
    }

    #[test]
    fn display_is_single_deterministic_line() {
        let mut error = ValidationError::new("[2, 3, 4] is too long");
        assert_eq!(error.to_string(), "(root): [2, 3, 4] is too long");
        error.prepend_instance_chunk(&PathChunk::Index(2));
        error.prepend_instance_chunk(&PathChunk::Property("items".into()));
        assert_eq!(error.to_string(), "/items/2: [2, 3, 4] is too long");
    }

    #[test]
    fn errors_serialize_for_reports() {
        let mut error = ValidationError::new("3 is less than the minimum of 10");
        error.attribute("minimum", &json!(10), &json!(3), &json!({"minimum": 10}));
        error.prepend_instance_chunk(&PathChunk::Property("size".into()));
        let report = serde_json::to_value(&error).unwrap();
        assert_eq!(report["message"], json!("3 is less than the minimum of 10"));
        assert_eq!(report["keyword"], json!("minimum"));
        assert_eq!(report["instance_path"], json!("/size"));
        assert_eq!(report["schema_path"], json!(""));
    }

    #[test]
    fn first_failure_breaks_immediately() {
        let mut sink = FirstFailure::new();
        assert_eq!(sink.report(ValidationError::new("x")), ControlFlow::Break(()));
        assert!(sink.failed());
    }
}
