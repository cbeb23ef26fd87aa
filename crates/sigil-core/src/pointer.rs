//! # JSON Pointer Paths
//!
//! RFC 6901 pointer paths into a JSON value tree, used for both instance
//! locations and schema locations in validation failures.
//!
//! ## Front-Insertion Lifecycle
//!
//! A failure is created by the keyword check that detects it, with a path
//! local to that check (often empty). Each recursion level above it knows
//! only its own segment — a property name or an array index — and pushes
//! that segment onto the *front* of the path as the failure propagates up.
//! By the time a failure reaches the caller, its path reads root-to-leaf.
//! `JsonPointer` therefore stores segments in a deque.

use std::collections::VecDeque;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// One segment of a pointer path: an object property or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathChunk {
    /// Descent through an object property.
    Property(String),
    /// Descent through an array element.
    Index(usize),
}

impl PathChunk {
    /// The segment as it appears in RFC 6901 text, with `~` and `/` escaped.
    fn escaped(&self) -> String {
        match self {
            PathChunk::Property(name) => name.replace('~', "~0").replace('/', "~1"),
            PathChunk::Index(idx) => idx.to_string(),
        }
    }
}

impl From<&str> for PathChunk {
    fn from(name: &str) -> Self {
        PathChunk::Property(name.to_owned())
    }
}

impl From<String> for PathChunk {
    fn from(name: String) -> Self {
        PathChunk::Property(name)
    }
}

impl From<usize> for PathChunk {
    fn from(idx: usize) -> Self {
        PathChunk::Index(idx)
    }
}

impl fmt::Display for PathChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.escaped())
    }
}

/// Error parsing RFC 6901 pointer text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerParseError {
    /// A non-empty pointer must begin with `/`.
    #[error("json pointer {0:?} does not start with '/'")]
    MissingLeadingSlash(String),

    /// `~` must be followed by `0` or `1`.
    #[error("invalid escape {escape:?} in json pointer segment {segment:?}")]
    InvalidEscape {
        /// The offending escape sequence.
        escape: String,
        /// The segment containing it.
        segment: String,
    },
}

/// An ordered path from the root of a JSON value to a sub-value.
///
/// The empty pointer designates the root itself and renders as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPointer(VecDeque<PathChunk>);

impl JsonPointer {
    /// The root pointer.
    pub fn root() -> Self {
        Self(VecDeque::new())
    }

    /// Parse RFC 6901 pointer text (already percent-decoded).
    ///
    /// Every segment parses as a [`PathChunk::Property`]; whether a segment
    /// addresses an array index is decided at lookup time, because pointer
    /// text alone cannot distinguish the property `"0"` from index `0`.
    ///
    /// # Errors
    ///
    /// Returns [`PointerParseError`] if the text does not start with `/`
    /// (unless empty) or contains an invalid `~` escape.
    pub fn parse(text: &str) -> Result<Self, PointerParseError> {
        if text.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = text.strip_prefix('/') else {
            return Err(PointerParseError::MissingLeadingSlash(text.to_owned()));
        };
        let mut chunks = VecDeque::new();
        for raw in rest.split('/') {
            chunks.push_back(PathChunk::Property(unescape(raw)?));
        }
        Ok(Self(chunks))
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root pointer.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a segment at the leaf end.
    pub fn push_back(&mut self, chunk: impl Into<PathChunk>) {
        self.0.push_back(chunk.into());
    }

    /// Prepend a segment at the root end (error propagation).
    pub fn push_front(&mut self, chunk: impl Into<PathChunk>) {
        self.0.push_front(chunk.into());
    }

    /// Iterate segments root-to-leaf.
    pub fn iter(&self) -> impl Iterator<Item = &PathChunk> {
        self.0.iter()
    }

    /// Follow this pointer through `root`, returning the addressed sub-value.
    ///
    /// Property segments consisting of digits address array elements when the
    /// current value is an array (RFC 6901 lookup semantics).
    pub fn lookup<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        let mut current = root;
        for chunk in &self.0 {
            current = match (current, chunk) {
                (Value::Object(map), PathChunk::Property(name)) => map.get(name)?,
                (Value::Array(items), PathChunk::Index(idx)) => items.get(*idx)?,
                (Value::Array(items), PathChunk::Property(name)) => {
                    items.get(name.parse::<usize>().ok()?)?
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in &self.0 {
            write!(f, "/{}", chunk.escaped())?;
        }
        Ok(())
    }
}

/// Serializes as RFC 6901 text, the interchange form for error reports.
impl serde::Serialize for JsonPointer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Deserializes from RFC 6901 text. Index segments come back as digit
/// properties; [`JsonPointer::lookup`] treats the two alike.
impl<'de> serde::Deserialize<'de> for JsonPointer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        JsonPointer::parse(&text).map_err(serde::de::Error::custom)
    }
}

impl FromIterator<PathChunk> for JsonPointer {
    fn from_iter<T: IntoIterator<Item = PathChunk>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for JsonPointer {
    type Item = PathChunk;
    type IntoIter = <VecDeque<PathChunk> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn unescape(segment: &str) -> Result<String, PointerParseError> {
    if !segment.contains('~') {
        return Ok(segment.to_owned());
    }
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            other => {
                return Err(PointerParseError::InvalidEscape {
                    escape: format!("~{}", other.map(String::from).unwrap_or_default()),
                    segment: segment.to_owned(),
                })
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_renders_empty() {
        assert_eq!(JsonPointer::root().to_string(), "");
    }

    #[test]
    fn display_escapes_special_characters() {
        let mut ptr = JsonPointer::root();
        ptr.push_back("a/b");
        ptr.push_back("m~n");
        ptr.push_back(2usize);
        assert_eq!(ptr.to_string(), "/a~1b/m~0n/2");
    }

    #[test]
    fn parse_round_trips_display() {
        let ptr = JsonPointer::parse("/a~1b/m~0n/2").unwrap();
        assert_eq!(ptr.to_string(), "/a~1b/m~0n/2");
        assert_eq!(ptr.len(), 3);
    }

    #[test]
    fn parse_rejects_missing_slash() {
        assert!(matches!(
            JsonPointer::parse("a/b"),
            Err(PointerParseError::MissingLeadingSlash(_))
        ));
    }

    #[test]
    fn parse_rejects_bad_escape() {
        assert!(matches!(
            JsonPointer::parse("/a~2b"),
            Err(PointerParseError::InvalidEscape { .. })
        ));
    }

    #[test]
    fn lookup_descends_objects_and_arrays() {
        let doc = json!({"items": [{"name": "x"}, {"name": "y"}]});
        let ptr = JsonPointer::parse("/items/1/name").unwrap();
        assert_eq!(ptr.lookup(&doc), Some(&json!("y")));
    }

    #[test]
    fn lookup_misses_return_none() {
        let doc = json!({"a": [0]});
        assert_eq!(JsonPointer::parse("/a/5").unwrap().lookup(&doc), None);
        assert_eq!(JsonPointer::parse("/b").unwrap().lookup(&doc), None);
        assert_eq!(JsonPointer::parse("/a/x").unwrap().lookup(&doc), None);
    }

    #[test]
    fn serde_round_trips_as_pointer_text() {
        let ptr = JsonPointer::parse("/a~1b/2").unwrap();
        let text = serde_json::to_string(&ptr).unwrap();
        assert_eq!(text, "\"/a~1b/2\"");
        let back: JsonPointer = serde_json::from_str(&text).unwrap();
        assert_eq!(back.to_string(), "/a~1b/2");
    }

    #[test]
    fn push_front_prepends() {
        let mut ptr = JsonPointer::root();
        ptr.push_back("leaf");
        ptr.push_front(3usize);
        ptr.push_front("root");
        assert_eq!(ptr.to_string(), "/root/3/leaf");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_display_round_trip(segments in proptest::collection::vec("[a-z~/0-9]{0,8}", 0..5)) {
                let ptr: JsonPointer = segments
                    .iter()
                    .map(|s| PathChunk::Property(s.clone()))
                    .collect();
                let reparsed = JsonPointer::parse(&ptr.to_string()).unwrap();
                prop_assert_eq!(ptr, reparsed);
            }
        }
    }
}
