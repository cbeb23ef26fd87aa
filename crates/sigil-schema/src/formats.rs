//! # Format Checker — Soft-Failure Format Vocabulary
//!
//! Maps `format` names to string predicates. The policy here is deliberately
//! permissive in two places:
//!
//! - An *unregistered* format name conforms. Unknown formats are ignored by
//!   the specification, not treated as failures.
//! - A predicate may report that the capability it needs is unavailable
//!   ([`FormatDependencyUnavailable`]); conformance then degrades to a
//!   no-op rather than aborting the validation call.
//!
//! Format checking as a whole is opt-in per validator instance; when it is
//! off, the `format` keyword contributes nothing.
//!
//! The built-in catalogue is intentionally small — each entry is a trivial
//! predicate over the already-parsed string.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use sigil_core::JsonPointer;

/// A format predicate's required capability is not available in this
/// process. Never surfaced to callers: the checker treats the value as
/// conforming and moves on.
#[derive(Debug, Clone, Error)]
#[error("format dependency unavailable: {dependency}")]
pub struct FormatDependencyUnavailable {
    /// Name of the missing capability.
    pub dependency: String,
}

/// Predicate deciding whether a string conforms to a named format.
pub type FormatPredicate =
    Arc<dyn Fn(&str) -> Result<bool, FormatDependencyUnavailable> + Send + Sync>;

/// Persistent registry of format predicates.
#[derive(Clone, Default)]
pub struct FormatChecker {
    checkers: BTreeMap<String, FormatPredicate>,
}

impl FormatChecker {
    /// A checker with no registered formats: everything conforms.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in catalogue of trivial predicates.
    pub fn builtin() -> Self {
        let mut checker = Self::empty();
        let infallible: [(&str, fn(&str) -> bool); 10] = [
            ("date-time", |s| {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
            }),
            ("date", |s| {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            }),
            ("time", |s| {
                chrono::NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok()
            }),
            ("email", |s| {
                // Deliberately lenient: a non-terminal "@" only.
                s.contains('@') && !s.starts_with('@') && !s.ends_with('@')
            }),
            ("ipv4", |s| s.parse::<Ipv4Addr>().is_ok()),
            ("ipv6", |s| s.parse::<Ipv6Addr>().is_ok()),
            ("uri", |s| url::Url::parse(s).is_ok()),
            ("uuid", |s| uuid::Uuid::parse_str(s).is_ok()),
            ("regex", |s| regex::Regex::new(s).is_ok()),
            ("json-pointer", |s| JsonPointer::parse(s).is_ok()),
        ];
        for (name, predicate) in infallible {
            checker = checker.with_format(name, move |s| Ok(predicate(s)));
        }
        checker = checker.with_format("hostname", |s| Ok(is_hostname(s)));
        checker
    }

    /// Whether `name` is registered.
    pub fn is_known(&self, name: &str) -> bool {
        self.checkers.contains_key(name)
    }

    /// A new checker with `name` bound to `predicate`. `self` is unchanged.
    pub fn with_format(
        &self,
        name: &str,
        predicate: impl Fn(&str) -> Result<bool, FormatDependencyUnavailable> + Send + Sync + 'static,
    ) -> Self {
        let mut checkers = self.checkers.clone();
        checkers.insert(name.to_owned(), Arc::new(predicate));
        Self { checkers }
    }

    /// Whether `value` conforms to `format`.
    ///
    /// Non-strings conform (formats constrain strings only), unknown
    /// formats conform, and a predicate whose dependency is unavailable
    /// conforms — soft failure by policy, logged at debug level.
    pub fn conforms(&self, value: &Value, format: &str) -> bool {
        let Some(text) = value.as_str() else {
            return true;
        };
        let Some(predicate) = self.checkers.get(format) else {
            return true;
        };
        match predicate(text) {
            Ok(conforms) => conforms,
            Err(unavailable) => {
                debug!(
                    format,
                    dependency = %unavailable.dependency,
                    "format dependency unavailable; skipping format check"
                );
                true
            }
        }
    }
}

impl fmt::Debug for FormatChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatChecker")
            .field("formats", &self.checkers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// RFC 1123 hostname shape: dot-separated alphanumeric labels, hyphens
/// allowed in the interior, 63 bytes per label, 253 total.
fn is_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }
    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
