//! # sigil-core — Foundational Value Primitives
//!
//! This crate is the bedrock of the Sigil validation engine. It defines the
//! small set of value-model primitives the engine is built on. The engine
//! crate (`sigil-schema`) depends on `sigil-core`; `sigil-core` depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **The value model is `serde_json::Value`.** Schemas and instances are
//!    already-parsed JSON value trees, shared by reference during descent and
//!    never copied as a whole. This crate adds the semantics JSON Schema
//!    layers on top of raw JSON: numeric equality across representations,
//!    and pointer paths into a value tree.
//!
//! 2. **`JsonPointer` for locations.** Every reported validation failure
//!    carries two pointers: one into the instance, one into the schema.
//!    Segments are prepended as errors propagate upward, so the pointer type
//!    is optimized for front-insertion.
//!
//! 3. **Numeric equality is cross-representation.** `1`, `1.0`, and
//!    `1u64` are the same JSON number. Booleans are *never* numbers, even
//!    though some host languages conflate them — that exclusion is a
//!    correctness invariant, enforced structurally here.
//!
//! 4. **Deterministic rendering.** Error messages embed instance and schema
//!    fragments. [`render_value`] produces one stable textual form
//!    (`[2, 3, 4]`, `"abc"`, `{"a": 1}`) so message output is snapshot-safe.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `sigil-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod pointer;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use pointer::{JsonPointer, PathChunk, PointerParseError};
pub use value::{json_equal, json_type_name, num_cmp, num_eq, render_value};
