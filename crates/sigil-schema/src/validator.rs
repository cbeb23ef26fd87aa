//! # Validator — Dispatch Engine and Public Façade
//!
//! [`Validator`] binds a schema to a [`Dialect`] plus resolution
//! capabilities and exposes the query surface: [`iter_errors`],
//! [`is_valid`], [`validate`], [`check_schema`], and the streaming
//! [`validate_with`].
//!
//! Internally each call builds a [`Context`] — the per-session state:
//! the reference resolver with its scope stack and caches, and the
//! in-flight reference guard. Dispatch walks the schema object's keywords
//! in insertion order, looks each up in the dialect, and calls its
//! validator with a sink wrapped so that failures pick up attribution
//! (keyword, instance, schema, path segments) on the way out.
//!
//! [`iter_errors`]: Validator::iter_errors
//! [`is_valid`]: Validator::is_valid
//! [`validate`]: Validator::validate
//! [`check_schema`]: Validator::check_schema
//! [`validate_with`]: Validator::validate_with

use std::ops::ControlFlow::{self, Break, Continue};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use sigil_core::{render_value, PathChunk};

use crate::dialect::{dialect_for_schema, Dialect};
use crate::error::{
    ErrorBuffer, ErrorSink, FirstFailure, SchemaError, SigilResult, ValidationError,
    ValidationErrors,
};
use crate::resolver::{DocumentRegistry, NoRetrieve, RefResolver, Resolution, Retrieve};

/// Keywords whose name does not appear in their failures' schema paths.
/// `$ref` failures point into the *target* schema; `if` failures belong to
/// the `then`/`else` branch that produced them.
fn transparent(keyword: &str) -> bool {
    matches!(keyword, "$ref" | "$dynamicRef" | "if")
}

/// Per-call validation state. Keyword validators receive this to descend
/// into sub-schemas, probe silently, and resolve references.
pub struct Context<'a> {
    dialect: Dialect,
    resolver: RefResolver<'a>,
    /// (canonical reference URI, instance address) pairs currently being
    /// validated; a repeat pair is a reference cycle over the same value
    /// and vacuously succeeds instead of recursing forever.
    ref_stack: Vec<(String, usize)>,
    formats_enabled: bool,
}

impl Context<'_> {
    /// Validate `instance` against `schema` at the current scope.
    pub(crate) fn apply(
        &mut self,
        schema: &Value,
        instance: &Value,
        sink: &mut dyn ErrorSink,
    ) -> SigilResult<ControlFlow<()>> {
        let map = match schema {
            Value::Bool(true) => return Ok(Continue(())),
            Value::Bool(false) => {
                let mut error = ValidationError::new(format!(
                    "False schema does not allow {}",
                    render_value(instance)
                ));
                error.attribute("", schema, instance, schema);
                return Ok(sink.report(error));
            }
            Value::Object(map) => map,
            // Only booleans and objects are schemas; anything else
            // constrains nothing.
            _ => return Ok(Continue(())),
        };
        let dialect = self.dialect.clone();
        let entered = self.resolver.enter_scope(map, dialect.id_keyword());
        let outcome = self.apply_keywords(&dialect, map, schema, instance, sink);
        if entered {
            self.resolver.exit_scope();
        }
        outcome
    }

    fn apply_keywords(
        &mut self,
        dialect: &Dialect,
        map: &serde_json::Map<String, Value>,
        schema: &Value,
        instance: &Value,
        sink: &mut dyn ErrorSink,
    ) -> SigilResult<ControlFlow<()>> {
        if dialect.ref_ignores_siblings() {
            if let (Some(reference), Some(keyword)) = (map.get("$ref"), dialect.keyword("$ref")) {
                let mut attributed = AttributeSink {
                    inner: &mut *sink,
                    keyword: "$ref",
                    keyword_value: reference,
                    instance,
                    schema,
                };
                return (**keyword)(self, reference, instance, schema, &mut attributed);
            }
        }
        for (name, value) in map {
            let Some(keyword) = dialect.keyword(name) else {
                continue;
            };
            let mut attributed = AttributeSink {
                inner: &mut *sink,
                keyword: name,
                keyword_value: value,
                instance,
                schema,
            };
            if (**keyword)(self, value, instance, schema, &mut attributed)?.is_break() {
                return Ok(Break(()));
            }
        }
        Ok(Continue(()))
    }

    /// Validate a sub-relationship: `instance_chunk` names the sub-value's
    /// position in its parent (absent for same-value descents), and
    /// `schema_chunks` the sub-schema's position inside the keyword value.
    pub fn descend(
        &mut self,
        schema: &Value,
        instance: &Value,
        instance_chunk: Option<PathChunk>,
        schema_chunks: &[PathChunk],
        sink: &mut dyn ErrorSink,
    ) -> SigilResult<ControlFlow<()>> {
        let mut prefixed = PrefixSink {
            inner: sink,
            instance_chunk,
            schema_chunks,
        };
        self.apply(schema, instance, &mut prefixed)
    }

    /// Silent validity check: no failures escape, only the verdict.
    pub fn probe(&mut self, schema: &Value, instance: &Value) -> SigilResult<bool> {
        let mut sink = FirstFailure::new();
        let _ = self.apply(schema, instance, &mut sink)?;
        Ok(!sink.failed())
    }

    /// Collect every failure of a sub-schema descent, for combinators that
    /// wrap sub-failures as context.
    pub fn collect(
        &mut self,
        schema: &Value,
        instance: &Value,
        schema_chunks: &[PathChunk],
    ) -> SigilResult<Vec<ValidationError>> {
        let mut buffer = ErrorBuffer::new();
        let _ = self.descend(schema, instance, None, schema_chunks, &mut buffer)?;
        Ok(buffer.into_errors())
    }

    /// Validate `instance` against a freshly resolved reference target,
    /// with the target document's base as the active scope.
    pub(crate) fn validate_resolved(
        &mut self,
        resolution: Resolution,
        instance: &Value,
        sink: &mut dyn ErrorSink,
    ) -> SigilResult<ControlFlow<()>> {
        let address = instance as *const Value as usize;
        let frame = (resolution.uri, address);
        if self.ref_stack.contains(&frame) {
            // Same reference over the same value: a degenerate cycle.
            // A genuinely recursive schema recurses over *smaller* values
            // and never trips this guard.
            return Ok(Continue(()));
        }
        self.ref_stack.push(frame);
        self.resolver
            .push_base(resolution.base, resolution.document);
        let outcome = self.apply(resolution.schema.as_ref(), instance, sink);
        self.resolver.pop_base();
        self.ref_stack.pop();
        outcome
    }

    pub(crate) fn resolve(&mut self, reference: &str) -> SigilResult<Resolution> {
        self.resolver.resolve(reference)
    }

    pub(crate) fn resolve_dynamic(&mut self, reference: &str) -> SigilResult<Resolution> {
        self.resolver.resolve_dynamic(reference)
    }

    /// Test against the dialect's type vocabulary.
    pub fn is_type(&self, instance: &Value, name: &str) -> SigilResult<bool> {
        self.dialect.type_checker().is_type(instance, name)
    }

    pub fn format_conforms(&self, instance: &Value, format: &str) -> bool {
        self.dialect.format_checker().conforms(instance, format)
    }

    pub fn formats_enabled(&self) -> bool {
        self.formats_enabled
    }
}

/// Wraps the downstream sink for one keyword dispatch: fills attribution
/// on errors that don't carry it yet and prepends the keyword's own
/// schema-path segment (unless the keyword is path-transparent).
struct AttributeSink<'s, 'v> {
    inner: &'s mut dyn ErrorSink,
    keyword: &'v str,
    keyword_value: &'v Value,
    instance: &'v Value,
    schema: &'v Value,
}

impl ErrorSink for AttributeSink<'_, '_> {
    fn report(&mut self, mut error: ValidationError) -> ControlFlow<()> {
        error.attribute(self.keyword, self.keyword_value, self.instance, self.schema);
        if !transparent(self.keyword) {
            error.prepend_schema_chunk(&PathChunk::Property(self.keyword.to_owned()));
        }
        self.inner.report(error)
    }
}

/// Wraps the downstream sink for one descent: prepends the instance-path
/// and schema-path segments that locate the sub-relationship.
struct PrefixSink<'s, 'v> {
    inner: &'s mut dyn ErrorSink,
    instance_chunk: Option<PathChunk>,
    schema_chunks: &'v [PathChunk],
}

impl ErrorSink for PrefixSink<'_, '_> {
    fn report(&mut self, mut error: ValidationError) -> ControlFlow<()> {
        if let Some(chunk) = &self.instance_chunk {
            error.prepend_instance_chunk(chunk);
        }
        for chunk in self.schema_chunks.iter().rev() {
            error.prepend_schema_chunk(chunk);
        }
        self.inner.report(error)
    }
}

/// A schema bound to a dialect, ready to validate instances.
///
/// Construction is cheap and infallible; the schema is *not* checked
/// against its meta-schema unless [`check_schema`](Self::check_schema) is
/// called. A validator is immutable and shareable across threads.
#[derive(Clone)]
pub struct Validator {
    dialect: Dialect,
    schema: Arc<Value>,
    registry: DocumentRegistry,
    retriever: Arc<dyn Retrieve>,
    formats_enabled: bool,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("dialect", &self.dialect.name())
            .field("schema", &self.schema)
            .field("formats_enabled", &self.formats_enabled)
            .finish()
    }
}

impl Validator {
    /// Bind `schema` with default options: dialect chosen by the schema's
    /// own `$schema` declaration, no external documents, no retrieval,
    /// format checking off.
    pub fn new(schema: Value) -> Self {
        Self::options().build(schema)
    }

    /// Start configuring a validator.
    pub fn options() -> ValidationOptions {
        ValidationOptions::default()
    }

    /// The dialect this validator dispatches with.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// The bound schema.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    fn context(&self) -> Context<'_> {
        Context {
            dialect: self.dialect.clone(),
            resolver: RefResolver::new(
                self.schema.clone(),
                self.dialect.id_keyword(),
                &self.registry,
                self.retriever.as_ref(),
            ),
            ref_stack: Vec::new(),
            formats_enabled: self.formats_enabled,
        }
    }

    /// Stream failures into `sink` as they are found. Returns whether the
    /// sink halted traversal early.
    ///
    /// # Errors
    ///
    /// Fatal conditions (unknown type names, unresolvable references)
    /// abort the call; anything already reported to the sink stands.
    pub fn validate_with(
        &self,
        instance: &Value,
        sink: &mut dyn ErrorSink,
    ) -> SigilResult<ControlFlow<()>> {
        self.context().apply(&self.schema, instance, sink)
    }

    /// Every failure of `instance` against the schema, in discovery order.
    /// An empty collection means the instance is valid.
    ///
    /// # Errors
    ///
    /// Fatal conditions only; validation failures are part of the `Ok`
    /// payload.
    pub fn iter_errors(&self, instance: &Value) -> SigilResult<ValidationErrors> {
        let mut buffer = ErrorBuffer::new();
        let _ = self.validate_with(instance, &mut buffer)?;
        Ok(buffer.into_errors().into())
    }

    /// Boolean verdict, stopping at the first failure.
    ///
    /// A fatal condition also yields `false` — the schema could not vouch
    /// for the instance — and is logged, since this surface has no error
    /// channel.
    pub fn is_valid(&self, instance: &Value) -> bool {
        let mut sink = FirstFailure::new();
        match self.validate_with(instance, &mut sink) {
            Ok(_) => !sink.failed(),
            Err(error) => {
                warn!(%error, "validation aborted; treating instance as invalid");
                false
            }
        }
    }

    /// Validate and surface the single most relevant failure.
    ///
    /// # Errors
    ///
    /// [`SigilError::Validation`] carrying the best-match failure, or a
    /// fatal condition.
    ///
    /// [`SigilError::Validation`]: crate::SigilError::Validation
    pub fn validate(&self, instance: &Value) -> SigilResult<()> {
        let errors = self.iter_errors(instance)?;
        match errors.best_match() {
            None => Ok(()),
            Some(best) => Err(best.clone().into()),
        }
    }

    /// Check the bound schema against the dialect's meta-schema.
    ///
    /// # Errors
    ///
    /// [`SigilError::Schema`] with every meta-validation failure.
    ///
    /// [`SigilError::Schema`]: crate::SigilError::Schema
    pub fn check_schema(&self) -> SigilResult<()> {
        let meta = Validator {
            dialect: self.dialect.clone(),
            schema: self.dialect.meta_schema_arc(),
            registry: self.registry.clone(),
            retriever: self.retriever.clone(),
            formats_enabled: false,
        };
        let errors = meta.iter_errors(&self.schema)?;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::new(errors).into())
        }
    }
}

/// Builder for [`Validator`] construction.
pub struct ValidationOptions {
    dialect: Option<Dialect>,
    registry: DocumentRegistry,
    retriever: Arc<dyn Retrieve>,
    formats_enabled: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            dialect: None,
            registry: DocumentRegistry::new(),
            retriever: Arc::new(NoRetrieve),
            formats_enabled: false,
        }
    }
}

impl ValidationOptions {
    /// Force a dialect instead of honoring the schema's `$schema`.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Pre-registered documents available to reference resolution.
    pub fn registry(mut self, registry: DocumentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Capability for fetching documents not in the registry.
    pub fn retriever(mut self, retriever: impl Retrieve + 'static) -> Self {
        self.retriever = Arc::new(retriever);
        self
    }

    /// Enable the `format` keyword (off unless requested).
    pub fn format_checking(mut self, enabled: bool) -> Self {
        self.formats_enabled = enabled;
        self
    }

    /// Bind `schema` under the configured options.
    pub fn build(self, schema: Value) -> Validator {
        let dialect = self
            .dialect
            .unwrap_or_else(|| dialect_for_schema(&schema));
        Validator {
            dialect,
            schema: Arc::new(schema),
            registry: self.registry,
            retriever: self.retriever,
            formats_enabled: self.formats_enabled,
        }
    }
}
