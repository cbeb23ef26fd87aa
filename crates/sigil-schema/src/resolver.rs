//! # Reference Resolver
//!
//! Resolves `$ref`-style references against a base-URI scope stack, with:
//!
//! - an injected [`Retrieve`] capability for documents not already known
//!   (the engine never performs transport itself),
//! - a [`DocumentRegistry`] of pre-registered in-memory documents keyed by
//!   their declared identifier,
//! - a per-session resolution cache (one top-level validation call),
//!   discarded when the call returns,
//! - a per-call-stack "currently retrieving" set enforcing at most one
//!   in-flight retrieval per reference, so a structural cycle during
//!   retrieval is reported instead of looping.
//!
//! Failed retrievals never enter the cache; a later, independent call
//! starts clean.
//!
//! ## Scope Discipline
//!
//! Every entry into a schema object declaring a new identifier pushes a
//! scope frame; every exit pops it. The engine threads push/pop around each
//! recursion so frames mirror lexical nesting exactly and unwind on every
//! exit path, including an early halt in first-error mode.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::Url;

use sigil_core::JsonPointer;

use crate::error::{SigilError, SigilResult};

/// Base URI assigned to documents that declare no identifier of their own.
const DEFAULT_ROOT: &str = "json-schema:///";

/// Injected schema-retrieval capability.
///
/// Implementations fetch and parse the document behind a URI; transport,
/// timeouts, and on-disk caching are entirely their concern.
pub trait Retrieve: Send + Sync {
    /// Fetch the schema document identified by `uri`.
    ///
    /// # Errors
    ///
    /// Any error is surfaced to the caller as an unresolvable reference.
    fn retrieve(&self, uri: &str) -> Result<Value, Box<dyn std::error::Error + Send + Sync>>;
}

/// The default capability: retrieval always fails. Validation that never
/// leaves the root document and the registry never notices.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetrieve;

impl Retrieve for NoRetrieve {
    fn retrieve(&self, uri: &str) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(format!("no retrieval capability configured (requested {uri})").into())
    }
}

/// In-memory store of schema documents keyed by absolute URI.
#[derive(Debug, Clone, Default)]
pub struct DocumentRegistry {
    documents: HashMap<String, Arc<Value>>,
}

impl DocumentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` under its declared `$id` (or legacy `id`).
    ///
    /// # Errors
    ///
    /// Returns [`SigilError::UnresolvableReference`] if the document
    /// declares no identifier.
    pub fn register(&mut self, document: Value) -> SigilResult<()> {
        let id = document
            .get("$id")
            .or_else(|| document.get("id"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        match id {
            Some(id) => self.register_at(&id, document),
            None => Err(SigilError::UnresolvableReference {
                reference: String::new(),
                reason: "document declares no $id to register under".to_owned(),
            }),
        }
    }

    /// Register `document` under an explicit URI (relative URIs are rooted
    /// at the engine's default base).
    ///
    /// # Errors
    ///
    /// Returns [`SigilError::UnresolvableReference`] if `uri` cannot be
    /// parsed.
    pub fn register_at(&mut self, uri: &str, document: Value) -> SigilResult<()> {
        let url = parse_against_default(uri).map_err(|reason| {
            SigilError::UnresolvableReference {
                reference: uri.to_owned(),
                reason,
            }
        })?;
        self.documents
            .insert(document_key(&url), Arc::new(document));
        Ok(())
    }

    /// Look up a document by absolute URI.
    pub fn get(&self, uri: &str) -> Option<Arc<Value>> {
        self.documents.get(uri).cloned()
    }

    /// Number of registered documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Outcome of resolving one reference.
#[derive(Debug)]
pub(crate) struct Resolution {
    /// Canonical absolute form of the reference, fragment included.
    pub uri: String,
    /// Base URI of the containing document, pushed as the active scope
    /// while validating against the target.
    pub base: Url,
    /// The resolved schema.
    pub schema: Arc<Value>,
    /// The whole containing document (dynamic-anchor searches need it).
    pub document: Arc<Value>,
}

/// Per-validation-session reference resolver.
pub(crate) struct RefResolver<'a> {
    registry: &'a DocumentRegistry,
    retriever: &'a dyn Retrieve,
    root: Arc<Value>,
    root_key: String,
    scopes: Vec<Url>,
    /// Session cache: document URI (no fragment) → parsed document.
    documents: HashMap<String, Arc<Value>>,
    /// Session cache: canonical absolute reference → resolved schema.
    /// Never holds a reference whose retrieval is still in progress.
    resolutions: HashMap<String, Arc<Value>>,
    /// In-flight retrievals, stack-ordered.
    retrieving: Vec<String>,
    /// Documents entered so far, outermost first (dynamic scope).
    dynamic: Vec<Arc<Value>>,
}

impl<'a> RefResolver<'a> {
    /// Build a resolver rooted at `root`, whose base URI is the document's
    /// identifier under `id_keyword`, or the default base if absent.
    pub(crate) fn new(
        root: Arc<Value>,
        id_keyword: &str,
        registry: &'a DocumentRegistry,
        retriever: &'a dyn Retrieve,
    ) -> Self {
        let base = root
            .get(id_keyword)
            .and_then(Value::as_str)
            .and_then(|id| parse_against_default(id).ok())
            .unwrap_or_else(default_root);
        let root_key = document_key(&base);
        let dynamic = vec![root.clone()];
        Self {
            registry,
            retriever,
            root,
            root_key,
            scopes: vec![base],
            documents: HashMap::new(),
            resolutions: HashMap::new(),
            retrieving: Vec::new(),
            dynamic,
        }
    }

    /// The active base URI.
    pub(crate) fn scope(&self) -> &Url {
        // The stack is seeded with one frame and pops are paired with
        // pushes, so it is never empty.
        self.scopes.last().unwrap_or_else(|| unreachable!())
    }

    /// Push a scope frame for a schema object declaring `id_keyword`.
    /// Returns whether a frame was pushed; the caller pairs it with
    /// [`Self::exit_scope`] on every exit path.
    pub(crate) fn enter_scope(&mut self, schema: &serde_json::Map<String, Value>, id_keyword: &str) -> bool {
        let Some(id) = schema.get(id_keyword).and_then(Value::as_str) else {
            return false;
        };
        match self.scope().join(id) {
            Ok(url) => {
                self.scopes.push(url);
                true
            }
            Err(err) => {
                debug!(id, error = %err, "ignoring unjoinable identifier");
                false
            }
        }
    }

    /// Pop the frame pushed by a successful [`Self::enter_scope`].
    pub(crate) fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    /// Push an explicit base (the target document of a reference).
    pub(crate) fn push_base(&mut self, base: Url, document: Arc<Value>) {
        self.scopes.push(base);
        self.dynamic.push(document);
    }

    /// Pop the frame pushed by [`Self::push_base`].
    pub(crate) fn pop_base(&mut self) {
        self.scopes.pop();
        self.dynamic.pop();
    }

    /// Resolve `reference` against the active scope.
    ///
    /// # Errors
    ///
    /// Returns [`SigilError::UnresolvableReference`] when the reference
    /// cannot be joined, retrieved, or located within its document.
    pub(crate) fn resolve(&mut self, reference: &str) -> SigilResult<Resolution> {
        let absolute = self.scope().join(reference).map_err(|err| {
            SigilError::UnresolvableReference {
                reference: reference.to_owned(),
                reason: err.to_string(),
            }
        })?;
        let uri = absolute.to_string();
        let fragment = percent_decode(absolute.fragment().unwrap_or(""));
        let base = strip_fragment(&absolute);
        let document = self.document(&base, reference)?;

        if let Some(schema) = self.resolutions.get(&uri) {
            return Ok(Resolution {
                uri,
                base,
                schema: schema.clone(),
                document,
            });
        }

        let schema = if fragment.is_empty() {
            document.clone()
        } else {
            let target = resolve_fragment(&document, &fragment).ok_or_else(|| {
                SigilError::UnresolvableReference {
                    reference: reference.to_owned(),
                    reason: format!("fragment {fragment:?} not found in {}", document_key(&base)),
                }
            })?;
            Arc::new(target.clone())
        };
        self.resolutions.insert(uri.clone(), schema.clone());
        Ok(Resolution {
            uri,
            base,
            schema,
            document,
        })
    }

    /// Resolve a `$dynamicRef` fragment: the *outermost* document in the
    /// dynamic scope carrying a matching `$dynamicAnchor` wins. Falls back
    /// to ordinary resolution when no dynamic anchor is in scope.
    pub(crate) fn resolve_dynamic(&mut self, reference: &str) -> SigilResult<Resolution> {
        if let Some(anchor) = reference.strip_prefix('#') {
            let decoded = percent_decode(anchor);
            if !decoded.is_empty() && !decoded.starts_with('/') {
                for document in self.dynamic.clone() {
                    if let Some(schema) = find_dynamic_anchor(&document, &decoded) {
                        return Ok(Resolution {
                            uri: format!("{}#{}", self.scope(), decoded),
                            base: strip_fragment(self.scope()),
                            schema: Arc::new(schema.clone()),
                            document,
                        });
                    }
                }
            }
        }
        self.resolve(reference)
    }

    fn document(&mut self, base: &Url, reference: &str) -> SigilResult<Arc<Value>> {
        let key = document_key(base);
        if key == self.root_key {
            return Ok(self.root.clone());
        }
        if let Some(document) = self.documents.get(&key) {
            return Ok(document.clone());
        }
        if let Some(document) = self.registry.get(&key) {
            self.documents.insert(key, document.clone());
            return Ok(document);
        }
        if self.retrieving.iter().any(|inflight| *inflight == key) {
            // A retrieval for this URI is already on the call stack: a
            // structural cycle in retrieval, not a validation failure.
            return Err(SigilError::UnresolvableReference {
                reference: reference.to_owned(),
                reason: format!("retrieval of {key} is already in progress"),
            });
        }
        self.retrieving.push(key.clone());
        let fetched = self.retriever.retrieve(&key);
        self.retrieving.pop();
        let value = fetched.map_err(|err| SigilError::UnresolvableReference {
            reference: reference.to_owned(),
            reason: err.to_string(),
        })?;
        debug!(uri = %key, "retrieved schema document");
        let document = Arc::new(value);
        self.documents.insert(key, document.clone());
        Ok(document)
    }
}

/// Locate `fragment` within `document`: empty → whole document, pointer
/// text → RFC 6901 lookup, otherwise a plain-name anchor search.
fn resolve_fragment<'v>(document: &'v Value, fragment: &str) -> Option<&'v Value> {
    if fragment.is_empty() {
        return Some(document);
    }
    if fragment.starts_with('/') {
        return JsonPointer::parse(fragment).ok()?.lookup(document);
    }
    find_anchor(document, fragment)
}

/// Depth-first search for a schema object anchored as `name` via
/// `$anchor`, `$dynamicAnchor`, or a fragment-only `$id`/`id`.
fn find_anchor<'v>(value: &'v Value, name: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => {
            let anchored = map.get("$anchor").and_then(Value::as_str) == Some(name)
                || map.get("$dynamicAnchor").and_then(Value::as_str) == Some(name)
                || ["$id", "id"].iter().any(|key| {
                    map.get(*key)
                        .and_then(Value::as_str)
                        .and_then(|id| id.strip_prefix('#'))
                        == Some(name)
                });
            if anchored {
                return Some(value);
            }
            map.values().find_map(|child| find_anchor(child, name))
        }
        Value::Array(items) => items.iter().find_map(|child| find_anchor(child, name)),
        _ => None,
    }
}

/// Like [`find_anchor`] but matching `$dynamicAnchor` only.
fn find_dynamic_anchor<'v>(value: &'v Value, name: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => {
            if map.get("$dynamicAnchor").and_then(Value::as_str) == Some(name) {
                return Some(value);
            }
            map.values()
                .find_map(|child| find_dynamic_anchor(child, name))
        }
        Value::Array(items) => items
            .iter()
            .find_map(|child| find_dynamic_anchor(child, name)),
        _ => None,
    }
}

fn default_root() -> Url {
    // The constant is a valid URL; parsing cannot fail.
    Url::parse(DEFAULT_ROOT).unwrap_or_else(|_| unreachable!())
}

fn parse_against_default(uri: &str) -> Result<Url, String> {
    match Url::parse(uri) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => default_root()
            .join(uri)
            .map_err(|err| err.to_string()),
        Err(err) => Err(err.to_string()),
    }
}

fn strip_fragment(url: &Url) -> Url {
    let mut base = url.clone();
    base.set_fragment(None);
    base
}

fn document_key(url: &Url) -> String {
    strip_fragment(url).to_string()
}

fn percent_decode(text: &str) -> String {
    if !text.contains('%') {
        return text.to_owned();
    }
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver_for<'a>(
        root: &Value,
        registry: &'a DocumentRegistry,
        retriever: &'a dyn Retrieve,
    ) -> RefResolver<'a> {
        RefResolver::new(Arc::new(root.clone()), "$id", registry, retriever)
    }

    #[test]
    fn resolves_local_pointer_fragments() {
        let registry = DocumentRegistry::new();
        let root = json!({"definitions": {"positive": {"minimum": 0}}});
        let mut resolver = resolver_for(&root, &registry, &NoRetrieve);
        let resolution = resolver.resolve("#/definitions/positive").unwrap();
        assert_eq!(*resolution.schema, json!({"minimum": 0}));
    }

    #[test]
    fn resolves_own_identifier_without_retrieval() {
        let registry = DocumentRegistry::new();
        let root = json!({"$id": "n", "properties": {"child": {"$ref": "n"}}});
        let mut resolver = resolver_for(&root, &registry, &NoRetrieve);
        let resolution = resolver.resolve("n").unwrap();
        assert_eq!(*resolution.schema, root);
    }

    #[test]
    fn registry_documents_shadow_retrieval() {
        let mut registry = DocumentRegistry::new();
        registry
            .register(json!({"$id": "https://example.com/item", "type": "integer"}))
            .unwrap();
        let root = json!({});
        let mut resolver = resolver_for(&root, &registry, &NoRetrieve);
        let resolution = resolver.resolve("https://example.com/item").unwrap();
        assert_eq!(*resolution.schema, json!({"$id": "https://example.com/item", "type": "integer"}));
    }

    #[test]
    fn unresolvable_reference_is_fatal_and_uncached() {
        let registry = DocumentRegistry::new();
        let root = json!({});
        let mut resolver = resolver_for(&root, &registry, &NoRetrieve);
        let err = resolver.resolve("https://example.com/missing").unwrap_err();
        assert!(matches!(err, SigilError::UnresolvableReference { .. }));
        assert!(resolver.documents.is_empty());
        assert!(resolver.resolutions.is_empty());
    }

    #[test]
    fn anchors_resolve_by_name() {
        let registry = DocumentRegistry::new();
        let root = json!({
            "$defs": {"leaf": {"$anchor": "leaf", "type": "string"}}
        });
        let mut resolver = resolver_for(&root, &registry, &NoRetrieve);
        let resolution = resolver.resolve("#leaf").unwrap();
        assert_eq!(*resolution.schema, json!({"$anchor": "leaf", "type": "string"}));
    }

    #[test]
    fn scope_stack_changes_relative_resolution() {
        let mut registry = DocumentRegistry::new();
        registry
            .register(json!({"$id": "https://example.com/a/inner", "const": 1}))
            .unwrap();
        let root = json!({});
        let mut resolver = resolver_for(&root, &registry, &NoRetrieve);
        let outer = serde_json::Map::from_iter([(
            "$id".to_owned(),
            json!("https://example.com/a/outer"),
        )]);
        assert!(resolver.enter_scope(&outer, "$id"));
        let resolution = resolver.resolve("inner").unwrap();
        assert_eq!(*resolution.schema, json!({"$id": "https://example.com/a/inner", "const": 1}));
        resolver.exit_scope();
        assert!(resolver.resolve("inner").is_err());
    }

    #[test]
    fn session_cache_serves_repeat_resolutions() {
        struct CountingRetriever(std::sync::atomic::AtomicUsize);
        impl Retrieve for CountingRetriever {
            fn retrieve(
                &self,
                _uri: &str,
            ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(json!({"type": "string"}))
            }
        }
        let registry = DocumentRegistry::new();
        let retriever = CountingRetriever(std::sync::atomic::AtomicUsize::new(0));
        let root = json!({});
        let mut resolver = resolver_for(&root, &registry, &retriever);
        resolver.resolve("https://example.com/s").unwrap();
        resolver.resolve("https://example.com/s").unwrap();
        resolver.resolve("https://example.com/s#/type").unwrap();
        assert_eq!(retriever.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn percent_encoded_pointer_fragments_decode() {
        let registry = DocumentRegistry::new();
        let root = json!({"a b": {"const": 1}});
        let mut resolver = resolver_for(&root, &registry, &NoRetrieve);
        let resolution = resolver.resolve("#/a%20b").unwrap();
        assert_eq!(*resolution.schema, json!({"const": 1}));
    }
}
