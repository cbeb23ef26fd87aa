//! # Value Semantics
//!
//! JSON Schema semantics layered over raw `serde_json::Value`:
//! cross-representation numeric equality and ordering, type naming, and the
//! deterministic rendering used inside validation messages.
//!
//! ## Numeric Invariant
//!
//! JSON has one number type. `1`, `1.0`, and `1u64` are equal for `enum`,
//! `const`, and `uniqueItems` purposes even though `serde_json` stores them
//! under different representations. Booleans are never numbers — `serde_json`
//! already keeps them in a distinct variant, and nothing here bridges the gap.

use std::cmp::Ordering;
use std::fmt::Write as _;

use serde_json::{Number, Value};

/// The JSON type name of a value, as used in schema `type` lists.
///
/// Numbers report `"number"`; whether a given number also satisfies
/// `"integer"` is a dialect question answered by the engine's type checker.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Numeric equality across `i64`/`u64`/`f64` representations.
pub fn num_eq(a: &Number, b: &Number) -> bool {
    num_cmp(a, b) == Some(Ordering::Equal)
}

/// Numeric ordering across `i64`/`u64`/`f64` representations.
///
/// Returns `None` only when a float operand is NaN, which cannot appear in
/// parsed JSON but can be constructed programmatically.
pub fn num_cmp(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    // Mixed sign or float involved: compare as f64. u64 values above 2^53
    // lose precision here, matching the behavior of every JSON system that
    // round-trips through doubles.
    let x = a.as_f64()?;
    let y = b.as_f64()?;
    x.partial_cmp(&y)
}

/// Structural equality with JSON Schema number semantics.
///
/// Identical to `Value == Value` except that numbers compare by numeric
/// value rather than by representation, recursively.
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => num_eq(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Render a value for inclusion in a validation message.
///
/// One stable textual form, independent of input formatting: `null`,
/// `true`, `4`, `1.5`, `"abc"` (JSON string escaping), `[2, 3, 4]`,
/// `{"a": 1, "b": 2}` with object keys in insertion order. Separators carry
/// a space so messages read as prose ("`[2, 3, 4] is too long`").
pub fn render_value(value: &Value) -> String {
    let mut out = String::new();
    render_into(&mut out, value);
    out
}

fn render_into(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => {
            // serde_json::to_string on a &str cannot fail.
            match serde_json::to_string(s) {
                Ok(quoted) => out.push_str(&quoted),
                Err(_) => out.push_str("\"\""),
            }
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_into(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match serde_json::to_string(key) {
                    Ok(quoted) => out.push_str(&quoted),
                    Err(_) => out.push_str("\"\""),
                }
                out.push_str(": ");
                render_into(out, item);
            }
            out.push('}');
        }
    }
}
