//! # Dialects
//!
//! A [`Dialect`] bundles everything draft-dependent: the keyword map, the
//! type and format vocabularies, the identifier keyword (`id` vs `$id`),
//! the sibling policy for `$ref`, and the meta-schema used by
//! `check_schema`. Dialects are cheap handles over shared immutable state;
//! cloning one never copies the keyword map.
//!
//! Three drafts ship built in — 4, 7, and 2020-12 — and custom dialects
//! are derived from an existing one with [`Dialect::extend`] or built from
//! nothing with [`Dialect::create`]. A process-wide registry maps dialect
//! names and `$schema` URIs to dialects so schemas can select their own
//! dialect at validation time.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::error::ErrorSink;
use crate::formats::FormatChecker;
use crate::keywords::{self, KeywordFn, KeywordMap};
use crate::types::TypeChecker;
use crate::validator::Context;
use crate::SigilResult;

/// `$schema` URI of the Draft 4 meta-schema.
pub const DRAFT4_URI: &str = "http://json-schema.org/draft-04/schema#";
/// `$schema` URI of the Draft 7 meta-schema.
pub const DRAFT7_URI: &str = "http://json-schema.org/draft-07/schema#";
/// `$schema` URI of the Draft 2020-12 meta-schema.
pub const DRAFT202012_URI: &str = "https://json-schema.org/draft/2020-12/schema";

struct DialectInner {
    name: String,
    spec_uri: String,
    id_keyword: String,
    meta_schema: Arc<Value>,
    keywords: KeywordMap,
    type_checker: TypeChecker,
    format_checker: FormatChecker,
    /// Pre-2019 drafts: a schema object containing `$ref` behaves as if it
    /// contained nothing else.
    ref_ignores_siblings: bool,
}

/// A JSON Schema draft (or a user-derived variant of one).
#[derive(Clone)]
pub struct Dialect {
    inner: Arc<DialectInner>,
}

impl Dialect {
    /// Draft 4.
    pub fn draft4() -> Self {
        static DIALECT: OnceLock<Dialect> = OnceLock::new();
        DIALECT
            .get_or_init(|| {
                Self::create("draft4", DRAFT4_URI)
                    .meta_schema(embedded_meta(include_str!("../metaschemas/draft4.json")))
                    .id_keyword("id")
                    .ref_ignores_siblings(true)
                    .keywords(keywords::draft4())
                    .type_checker(TypeChecker::draft4())
                    .format_checker(FormatChecker::builtin())
                    .build()
            })
            .clone()
    }

    /// Draft 7.
    pub fn draft7() -> Self {
        static DIALECT: OnceLock<Dialect> = OnceLock::new();
        DIALECT
            .get_or_init(|| {
                Self::create("draft7", DRAFT7_URI)
                    .meta_schema(embedded_meta(include_str!("../metaschemas/draft7.json")))
                    .id_keyword("$id")
                    .ref_ignores_siblings(true)
                    .keywords(keywords::draft7())
                    .type_checker(TypeChecker::draft7())
                    .format_checker(FormatChecker::builtin())
                    .build()
            })
            .clone()
    }

    /// Draft 2020-12, the default dialect.
    pub fn draft202012() -> Self {
        static DIALECT: OnceLock<Dialect> = OnceLock::new();
        DIALECT
            .get_or_init(|| {
                Self::create("draft2020-12", DRAFT202012_URI)
                    .meta_schema(embedded_meta(include_str!(
                        "../metaschemas/draft2020-12.json"
                    )))
                    .id_keyword("$id")
                    .ref_ignores_siblings(false)
                    .keywords(keywords::draft202012())
                    .type_checker(TypeChecker::draft202012())
                    .format_checker(FormatChecker::builtin())
                    .build()
            })
            .clone()
    }

    /// The dialect used when a schema declares no `$schema`.
    pub fn default_dialect() -> Self {
        Self::draft202012()
    }

    /// Start a dialect from nothing: no keywords, no types, no formats.
    pub fn create(name: &str, spec_uri: &str) -> DialectBuilder {
        DialectBuilder {
            name: name.to_owned(),
            spec_uri: spec_uri.to_owned(),
            id_keyword: "$id".to_owned(),
            meta_schema: Arc::new(Value::Bool(true)),
            keywords: KeywordMap::new(),
            type_checker: TypeChecker::empty(),
            format_checker: FormatChecker::empty(),
            ref_ignores_siblings: false,
        }
    }

    /// Derive a new dialect from this one. The builder starts as an exact
    /// copy (meta-schema included) under the new name; whatever is not
    /// overridden is inherited.
    pub fn extend(&self, name: &str) -> DialectBuilder {
        DialectBuilder {
            name: name.to_owned(),
            spec_uri: self.inner.spec_uri.clone(),
            id_keyword: self.inner.id_keyword.clone(),
            meta_schema: self.inner.meta_schema.clone(),
            keywords: self.inner.keywords.clone(),
            type_checker: self.inner.type_checker.clone(),
            format_checker: self.inner.format_checker.clone(),
            ref_ignores_siblings: self.inner.ref_ignores_siblings,
        }
    }

    /// Dialect name (e.g. `"draft7"`).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The `$schema` URI this dialect answers to.
    pub fn spec_uri(&self) -> &str {
        &self.inner.spec_uri
    }

    /// The meta-schema that valid schemas of this dialect conform to.
    pub fn meta_schema(&self) -> &Value {
        &self.inner.meta_schema
    }

    pub(crate) fn meta_schema_arc(&self) -> Arc<Value> {
        self.inner.meta_schema.clone()
    }

    /// The keyword declaring a schema object's identifier.
    pub fn id_keyword(&self) -> &str {
        &self.inner.id_keyword
    }

    /// This dialect's type vocabulary.
    pub fn type_checker(&self) -> &TypeChecker {
        &self.inner.type_checker
    }

    /// This dialect's format vocabulary.
    pub fn format_checker(&self) -> &FormatChecker {
        &self.inner.format_checker
    }

    pub(crate) fn keyword(&self, name: &str) -> Option<&KeywordFn> {
        self.inner.keywords.get(name)
    }

    pub(crate) fn ref_ignores_siblings(&self) -> bool {
        self.inner.ref_ignores_siblings
    }
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("name", &self.inner.name)
            .field("spec_uri", &self.inner.spec_uri)
            .field("keywords", &self.inner.keywords.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Assembles a [`Dialect`]; obtained from [`Dialect::create`] or
/// [`Dialect::extend`].
pub struct DialectBuilder {
    name: String,
    spec_uri: String,
    id_keyword: String,
    meta_schema: Arc<Value>,
    keywords: KeywordMap,
    type_checker: TypeChecker,
    format_checker: FormatChecker,
    ref_ignores_siblings: bool,
}

impl DialectBuilder {
    /// Set the `$schema` URI the dialect answers to.
    pub fn spec_uri(mut self, uri: &str) -> Self {
        self.spec_uri = uri.to_owned();
        self
    }

    /// Set the meta-schema.
    pub fn meta_schema(mut self, schema: Value) -> Self {
        self.meta_schema = Arc::new(schema);
        self
    }

    /// Set the identifier keyword (`"$id"` unless overridden).
    pub fn id_keyword(mut self, keyword: &str) -> Self {
        self.id_keyword = keyword.to_owned();
        self
    }

    /// Replace the entire keyword map.
    pub fn keywords(mut self, keywords: KeywordMap) -> Self {
        self.keywords = keywords;
        self
    }

    /// Bind one keyword, replacing any inherited binding of the same name.
    pub fn keyword(
        mut self,
        name: &str,
        keyword: impl for<'a> Fn(
                &mut Context<'a>,
                &Value,
                &Value,
                &Value,
                &mut dyn ErrorSink,
            ) -> SigilResult<std::ops::ControlFlow<()>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.keywords.insert(name.to_owned(), Arc::new(keyword));
        self
    }

    /// Drop an inherited keyword.
    pub fn remove_keyword(mut self, name: &str) -> Self {
        self.keywords.remove(name);
        self
    }

    /// Replace the type vocabulary.
    pub fn type_checker(mut self, checker: TypeChecker) -> Self {
        self.type_checker = checker;
        self
    }

    /// Replace the format vocabulary.
    pub fn format_checker(mut self, checker: FormatChecker) -> Self {
        self.format_checker = checker;
        self
    }

    /// Whether `$ref` suppresses its sibling keywords.
    pub fn ref_ignores_siblings(mut self, ignores: bool) -> Self {
        self.ref_ignores_siblings = ignores;
        self
    }

    /// Finish the dialect.
    pub fn build(self) -> Dialect {
        Dialect {
            inner: Arc::new(DialectInner {
                name: self.name,
                spec_uri: self.spec_uri,
                id_keyword: self.id_keyword,
                meta_schema: self.meta_schema,
                keywords: self.keywords,
                type_checker: self.type_checker,
                format_checker: self.format_checker,
                ref_ignores_siblings: self.ref_ignores_siblings,
            }),
        }
    }
}

fn embedded_meta(text: &str) -> Value {
    // Compile-time assets under metaschemas/; a parse failure is a build
    // defect, not a runtime condition.
    serde_json::from_str(text).expect("embedded meta-schema is valid JSON")
}

struct DialectRegistry {
    by_name: HashMap<String, Dialect>,
    by_spec_uri: HashMap<String, Dialect>,
}

impl DialectRegistry {
    fn seeded() -> Self {
        let mut registry = Self {
            by_name: HashMap::new(),
            by_spec_uri: HashMap::new(),
        };
        for dialect in [Dialect::draft4(), Dialect::draft7(), Dialect::draft202012()] {
            registry.insert(dialect);
        }
        registry
    }

    fn insert(&mut self, dialect: Dialect) {
        self.by_name
            .insert(dialect.name().to_owned(), dialect.clone());
        self.by_spec_uri
            .insert(normalize_spec_uri(dialect.spec_uri()), dialect);
    }
}

fn registry() -> &'static RwLock<DialectRegistry> {
    static REGISTRY: OnceLock<RwLock<DialectRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(DialectRegistry::seeded()))
}

/// Empty fragments are insignificant in `$schema` URIs; Draft 4 schemas
/// in the wild write the URI with and without the trailing `#`.
fn normalize_spec_uri(uri: &str) -> String {
    uri.trim_end_matches('#').to_owned()
}

/// Make `dialect` discoverable by name and by `$schema` URI, replacing any
/// earlier registration under either key.
pub fn register_dialect(dialect: Dialect) {
    let mut registry = match registry().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    registry.insert(dialect);
}

/// Look up a dialect by registered name.
pub fn dialect_for_name(name: &str) -> Option<Dialect> {
    let registry = match registry().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    registry.by_name.get(name).cloned()
}

/// Look up a dialect by `$schema` URI.
pub fn dialect_for_spec_uri(uri: &str) -> Option<Dialect> {
    let registry = match registry().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    registry.by_spec_uri.get(&normalize_spec_uri(uri)).cloned()
}

/// The dialect a schema asks for via `$schema`, or the default dialect
/// when the declaration is absent or unrecognized.
pub fn dialect_for_schema(schema: &Value) -> Dialect {
    let Some(uri) = schema.get("$schema").and_then(Value::as_str) else {
        return Dialect::default_dialect();
    };
    match dialect_for_spec_uri(uri) {
        Some(dialect) => dialect,
        None => {
            debug!(uri, "unrecognized $schema URI; using the default dialect");
            Dialect::default_dialect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_dialects_resolve_by_spec_uri() {
        assert_eq!(
            dialect_for_spec_uri(DRAFT7_URI).unwrap().name(),
            "draft7"
        );
        // With or without the trailing '#'.
        assert_eq!(
            dialect_for_spec_uri("http://json-schema.org/draft-04/schema")
                .unwrap()
                .name(),
            "draft4"
        );
    }

    #[test]
    fn schema_selects_its_own_dialect() {
        let schema = json!({"$schema": DRAFT4_URI, "minimum": 3});
        assert_eq!(dialect_for_schema(&schema).name(), "draft4");
        assert_eq!(dialect_for_schema(&json!({})).name(), "draft2020-12");
        let unknown = json!({"$schema": "https://example.com/own-meta"});
        assert_eq!(dialect_for_schema(&unknown).name(), "draft2020-12");
    }

    #[test]
    fn extend_inherits_without_mutating_the_parent() {
        let base = Dialect::draft7();
        let derived = base
            .extend("draft7-no-format")
            .spec_uri("https://example.com/no-format")
            .remove_keyword("format")
            .build();
        assert!(base.keyword("format").is_some());
        assert!(derived.keyword("format").is_none());
        assert!(derived.keyword("minimum").is_some());
        assert_eq!(derived.id_keyword(), "$id");
    }

    #[test]
    fn registered_dialects_are_discoverable() {
        let custom = Dialect::draft202012()
            .extend("custom-2026")
            .spec_uri("https://example.com/custom-2026")
            .build();
        register_dialect(custom);
        assert!(dialect_for_name("custom-2026").is_some());
        assert_eq!(
            dialect_for_schema(&json!({"$schema": "https://example.com/custom-2026"})).name(),
            "custom-2026"
        );
    }
}
