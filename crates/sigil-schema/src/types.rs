//! # Type Checker — Extensible Type Vocabulary
//!
//! Maps JSON Schema type names to predicates over values. Checkers are
//! persistent values: [`TypeChecker::redefine`] and [`TypeChecker::remove`]
//! return a *new* checker and leave the original untouched, so a dialect and
//! any dialect derived from it can be used concurrently without
//! interference. Predicates are `Arc`-shared, so derivation copies the map
//! of handles, never the predicates themselves.
//!
//! ## Numeric Invariant
//!
//! Booleans are never instances of `"integer"` or `"number"`. `serde_json`
//! keeps booleans in their own variant, so the exclusion holds structurally;
//! the tests pin it anyway because some source ecosystems conflate bool and
//! int and the exclusion is a correctness requirement, not an accident.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{SigilError, SigilResult};

/// Predicate deciding whether a value is an instance of a named type.
pub type TypePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Persistent registry of type-name predicates.
#[derive(Clone, Default)]
pub struct TypeChecker {
    checkers: BTreeMap<String, TypePredicate>,
}

impl TypeChecker {
    /// A checker with no registered types.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The seven primitive types with Draft 4 integer semantics:
    /// `1.0` is *not* an integer.
    pub fn draft4() -> Self {
        Self::primitives(is_strict_integer)
    }

    /// The seven primitive types with Draft 6+ integer semantics:
    /// any number with a zero fractional part is an integer.
    pub fn draft7() -> Self {
        Self::primitives(is_lenient_integer)
    }

    /// Same integer semantics as Draft 7.
    pub fn draft202012() -> Self {
        Self::primitives(is_lenient_integer)
    }

    fn primitives(integer: fn(&Value) -> bool) -> Self {
        let mut checkers: BTreeMap<String, TypePredicate> = BTreeMap::new();
        let entries: [(&str, fn(&Value) -> bool); 7] = [
            ("null", |v| v.is_null()),
            ("boolean", |v| v.is_boolean()),
            ("number", |v| v.is_number()),
            ("string", |v| v.is_string()),
            ("array", |v| v.is_array()),
            ("object", |v| v.is_object()),
            ("integer", integer),
        ];
        for (name, predicate) in entries {
            checkers.insert(name.to_owned(), Arc::new(predicate));
        }
        Self { checkers }
    }

    /// Whether `name` is registered.
    pub fn is_known(&self, name: &str) -> bool {
        self.checkers.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.checkers.keys().map(String::as_str)
    }

    /// Test `instance` against the predicate registered for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SigilError::UnknownType`] if `name` is not registered —
    /// a configuration error, never silently treated as a mismatch.
    pub fn is_type(&self, instance: &Value, name: &str) -> SigilResult<bool> {
        match self.checkers.get(name) {
            Some(predicate) => Ok(predicate(instance)),
            None => Err(SigilError::UnknownType {
                name: name.to_owned(),
            }),
        }
    }

    /// A new checker with `name` bound to `predicate`, replacing any
    /// previous binding. `self` is unchanged.
    pub fn redefine(
        &self,
        name: &str,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        let mut checkers = self.checkers.clone();
        checkers.insert(name.to_owned(), Arc::new(predicate));
        Self { checkers }
    }

    /// A new checker with several bindings replaced at once.
    pub fn redefine_many<I>(&self, definitions: I) -> Self
    where
        I: IntoIterator<Item = (String, TypePredicate)>,
    {
        let mut checkers = self.checkers.clone();
        for (name, predicate) in definitions {
            checkers.insert(name, predicate);
        }
        Self { checkers }
    }

    /// A new checker without `name`. `self` is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SigilError::UnknownType`] if `name` was never registered.
    pub fn remove(&self, name: &str) -> SigilResult<Self> {
        if !self.checkers.contains_key(name) {
            return Err(SigilError::UnknownType {
                name: name.to_owned(),
            });
        }
        let mut checkers = self.checkers.clone();
        checkers.remove(name);
        Ok(Self { checkers })
    }
}

impl fmt::Debug for TypeChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeChecker")
            .field("types", &self.checkers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn is_strict_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        _ => false,
    }
}

fn is_lenient_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        _ => false,
    }
}
