//! Applicator keywords: everything that recurses into sub-schemas, from
//! the object/array structure keywords to the boolean combinators.
//!
//! Conventions shared by all functions here:
//!
//! - Descents that move into a sub-value carry an instance-path chunk;
//!   descents that re-test the same value (combinators, `dependentSchemas`)
//!   do not.
//! - Schema-path chunks name the position inside the keyword's value (an
//!   index under `allOf`, a property name under `properties`); the keyword
//!   itself is prepended by the dispatcher.
//! - Combinator failures wrap their sub-failures as [`context`] on a single
//!   summary error rather than flooding the sink.
//!
//! [`context`]: crate::ValidationError::context

use std::ops::ControlFlow::{self, Break, Continue};

use serde_json::Value;
use tracing::debug;

use sigil_core::{render_value, PathChunk};

use crate::error::{ErrorSink, SigilResult, ValidationError};
use crate::validator::Context;

type Flow = SigilResult<ControlFlow<()>>;

pub(crate) fn properties(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Object(map), Value::Object(props)) = (instance, kw) else {
        return Ok(Continue(()));
    };
    for (name, subschema) in props {
        let Some(value) = map.get(name) else {
            continue;
        };
        let chunk = PathChunk::Property(name.clone());
        if cx
            .descend(subschema, value, Some(chunk.clone()), &[chunk], sink)?
            .is_break()
        {
            return Ok(Break(()));
        }
    }
    Ok(Continue(()))
}

pub(crate) fn pattern_properties(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Object(map), Value::Object(patterns)) = (instance, kw) else {
        return Ok(Continue(()));
    };
    for (pattern, subschema) in patterns {
        let re = match regex::Regex::new(pattern) {
            Ok(re) => re,
            Err(err) => {
                debug!(pattern, error = %err, "skipping uncompilable patternProperties entry");
                continue;
            }
        };
        for (name, value) in map {
            if !re.is_match(name) {
                continue;
            }
            let flow = cx.descend(
                subschema,
                value,
                Some(PathChunk::Property(name.clone())),
                &[PathChunk::Property(pattern.clone())],
                sink,
            )?;
            if flow.is_break() {
                return Ok(Break(()));
            }
        }
    }
    Ok(Continue(()))
}

/// Properties matched by neither `properties` nor `patternProperties`,
/// in the instance's own key order.
fn additional_keys<'v>(instance: &'v Value, schema: &Value) -> Vec<&'v String> {
    let Value::Object(map) = instance else {
        return Vec::new();
    };
    let declared = schema.get("properties").and_then(Value::as_object);
    let patterns: Vec<regex::Regex> = schema
        .get("patternProperties")
        .and_then(Value::as_object)
        .map(|patterns| {
            patterns
                .keys()
                .filter_map(|p| regex::Regex::new(p).ok())
                .collect()
        })
        .unwrap_or_default();
    map.keys()
        .filter(|name| {
            !declared.is_some_and(|d| d.contains_key(*name))
                && !patterns.iter().any(|re| re.is_match(name))
        })
        .collect()
}

pub(crate) fn additional_properties(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    if !instance.is_object() {
        return Ok(Continue(()));
    }
    let extras = additional_keys(instance, schema);
    if extras.is_empty() {
        return Ok(Continue(()));
    }
    if kw == &Value::Bool(false) {
        let mut names: Vec<String> = extras.iter().map(|n| format!("\"{n}\"")).collect();
        names.sort();
        let verb = if names.len() == 1 { "was" } else { "were" };
        let message = format!(
            "Additional properties are not allowed ({} {verb} unexpected)",
            names.join(", ")
        );
        return Ok(sink.report(ValidationError::new(message)));
    }
    for name in extras {
        // `instance` is an object here, so indexing cannot miss.
        let value = &instance[name.as_str()];
        let flow = cx.descend(kw, value, Some(PathChunk::Property(name.clone())), &[], sink)?;
        if flow.is_break() {
            return Ok(Break(()));
        }
    }
    Ok(Continue(()))
}

pub(crate) fn property_names(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let Value::Object(map) = instance else {
        return Ok(Continue(()));
    };
    for name in map.keys() {
        let as_value = Value::String(name.clone());
        if cx.descend(kw, &as_value, None, &[], sink)?.is_break() {
            return Ok(Break(()));
        }
    }
    Ok(Continue(()))
}

/// Pre-2020-12 `items`: an array of positional schemas or a single schema
/// applied uniformly.
pub(crate) fn items_prefixed(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let Value::Array(items) = instance else {
        return Ok(Continue(()));
    };
    match kw {
        Value::Array(positional) => {
            for (index, (subschema, item)) in positional.iter().zip(items).enumerate() {
                let flow = cx.descend(
                    subschema,
                    item,
                    Some(PathChunk::Index(index)),
                    &[PathChunk::Index(index)],
                    sink,
                )?;
                if flow.is_break() {
                    return Ok(Break(()));
                }
            }
        }
        subschema => {
            for (index, item) in items.iter().enumerate() {
                let flow =
                    cx.descend(subschema, item, Some(PathChunk::Index(index)), &[], sink)?;
                if flow.is_break() {
                    return Ok(Break(()));
                }
            }
        }
    }
    Ok(Continue(()))
}

/// Pre-2020-12 `additionalItems`: only meaningful when the sibling `items`
/// is array-form; covers elements past the positional prefix.
pub(crate) fn additional_items(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let Value::Array(items) = instance else {
        return Ok(Continue(()));
    };
    let Some(Value::Array(positional)) = schema.get("items") else {
        return Ok(Continue(()));
    };
    let prefix = positional.len();
    if items.len() <= prefix {
        return Ok(Continue(()));
    }
    if kw == &Value::Bool(false) {
        let extras = items[prefix..]
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", ");
        let verb = if items.len() - prefix == 1 { "was" } else { "were" };
        let message = format!("Additional items are not allowed ({extras} {verb} unexpected)");
        return Ok(sink.report(ValidationError::new(message)));
    }
    for (index, item) in items.iter().enumerate().skip(prefix) {
        let flow = cx.descend(kw, item, Some(PathChunk::Index(index)), &[], sink)?;
        if flow.is_break() {
            return Ok(Break(()));
        }
    }
    Ok(Continue(()))
}

/// Draft 2020-12 `prefixItems`: always array-form positional schemas.
pub(crate) fn prefix_items(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Array(items), Value::Array(positional)) = (instance, kw) else {
        return Ok(Continue(()));
    };
    for (index, (subschema, item)) in positional.iter().zip(items).enumerate() {
        let flow = cx.descend(
            subschema,
            item,
            Some(PathChunk::Index(index)),
            &[PathChunk::Index(index)],
            sink,
        )?;
        if flow.is_break() {
            return Ok(Break(()));
        }
    }
    Ok(Continue(()))
}

/// Draft 2020-12 `items`: covers elements past the sibling `prefixItems`.
pub(crate) fn items_remaining(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let Value::Array(items) = instance else {
        return Ok(Continue(()));
    };
    let prefix = schema
        .get("prefixItems")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    if items.len() <= prefix {
        return Ok(Continue(()));
    }
    if kw == &Value::Bool(false) {
        let message = format!(
            "Expected at most {prefix} items but found {}",
            items.len() - prefix
        );
        return Ok(sink.report(ValidationError::new(message)));
    }
    for (index, item) in items.iter().enumerate().skip(prefix) {
        let flow = cx.descend(kw, item, Some(PathChunk::Index(index)), &[], sink)?;
        if flow.is_break() {
            return Ok(Break(()));
        }
    }
    Ok(Continue(()))
}

/// Draft 6/7 `contains`: at least one element must match.
pub(crate) fn contains(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let Value::Array(items) = instance else {
        return Ok(Continue(()));
    };
    for item in items {
        if cx.probe(kw, item)? {
            return Ok(Continue(()));
        }
    }
    let message = format!(
        "None of {} are valid under the given schema",
        render_value(instance)
    );
    Ok(sink.report(ValidationError::new(message)))
}

/// Draft 2020-12 `contains`, counted against the sibling
/// `minContains`/`maxContains` bounds.
pub(crate) fn contains_counted(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let Value::Array(items) = instance else {
        return Ok(Continue(()));
    };
    let min_contains = schema
        .get("minContains")
        .and_then(Value::as_u64)
        .unwrap_or(1);
    let max_contains = schema
        .get("maxContains")
        .and_then(Value::as_u64)
        .unwrap_or(items.len() as u64);

    let mut matches = 0u64;
    for item in items {
        if cx.probe(kw, item)? {
            matches += 1;
            if matches > max_contains {
                let mut error = ValidationError::new(format!(
                    "Too many items match the given schema (expected at most {max_contains})"
                ));
                // Attributed to the bound that was broken, not to
                // `contains` itself.
                error.attribute(
                    "maxContains",
                    &schema["maxContains"],
                    instance,
                    schema,
                );
                return Ok(sink.report(error));
            }
        }
    }
    if matches >= min_contains {
        return Ok(Continue(()));
    }
    let message = if matches == 0 {
        format!(
            "{} does not contain items matching the given schema",
            render_value(instance)
        )
    } else {
        format!(
            "Too few items match the given schema \
             (expected at least {min_contains} but only {matches} matched)"
        )
    };
    Ok(sink.report(ValidationError::new(message)))
}

pub(crate) fn all_of(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let Value::Array(subschemas) = kw else {
        return Ok(Continue(()));
    };
    for (index, subschema) in subschemas.iter().enumerate() {
        let flow = cx.descend(subschema, instance, None, &[PathChunk::Index(index)], sink)?;
        if flow.is_break() {
            return Ok(Break(()));
        }
    }
    Ok(Continue(()))
}

pub(crate) fn any_of(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let Value::Array(subschemas) = kw else {
        return Ok(Continue(()));
    };
    let mut all_errors = Vec::new();
    for (index, subschema) in subschemas.iter().enumerate() {
        let errors = cx.collect(subschema, instance, &[PathChunk::Index(index)])?;
        if errors.is_empty() {
            return Ok(Continue(()));
        }
        all_errors.extend(errors);
    }
    let message = format!(
        "{} is not valid under any of the given schemas",
        render_value(instance)
    );
    Ok(sink.report(ValidationError::new(message).with_context(all_errors)))
}

pub(crate) fn one_of(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let Value::Array(subschemas) = kw else {
        return Ok(Continue(()));
    };
    let mut all_errors = Vec::new();
    let mut first_match = None;
    for (index, subschema) in subschemas.iter().enumerate() {
        let errors = cx.collect(subschema, instance, &[PathChunk::Index(index)])?;
        if errors.is_empty() {
            first_match = Some(index);
            break;
        }
        all_errors.extend(errors);
    }
    let Some(first) = first_match else {
        let message = format!(
            "{} is not valid under any of the given schemas",
            render_value(instance)
        );
        return Ok(sink.report(ValidationError::new(message).with_context(all_errors)));
    };
    let mut matches = vec![first];
    for (index, subschema) in subschemas.iter().enumerate().skip(first + 1) {
        if cx.probe(subschema, instance)? {
            matches.push(index);
        }
    }
    if matches.len() == 1 {
        return Ok(Continue(()));
    }
    let indexes = matches
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let message = format!(
        "{} is valid under each of the schemas at indexes {indexes}",
        render_value(instance)
    );
    Ok(sink.report(ValidationError::new(message)))
}

pub(crate) fn not_(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    if !cx.probe(kw, instance)? {
        return Ok(Continue(()));
    }
    let message = format!(
        "{} should not be valid under {}",
        render_value(instance),
        render_value(kw)
    );
    Ok(sink.report(ValidationError::new(message)))
}

/// `if`/`then`/`else`: the `if` outcome is consulted silently, then the
/// selected branch is applied with full error reporting.
pub(crate) fn if_then_else(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let branch = if cx.probe(kw, instance)? {
        "then"
    } else {
        "else"
    };
    let Some(subschema) = schema.get(branch) else {
        return Ok(Continue(()));
    };
    cx.descend(
        subschema,
        instance,
        None,
        &[PathChunk::Property(branch.to_owned())],
        sink,
    )
}

/// Draft 2020-12 `dependentSchemas`: the schema half of the old
/// `dependencies` keyword.
pub(crate) fn dependent_schemas(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Object(map), Value::Object(deps)) = (instance, kw) else {
        return Ok(Continue(()));
    };
    for (trigger, subschema) in deps {
        if !map.contains_key(trigger) {
            continue;
        }
        let flow = cx.descend(
            subschema,
            instance,
            None,
            &[PathChunk::Property(trigger.clone())],
            sink,
        )?;
        if flow.is_break() {
            return Ok(Break(()));
        }
    }
    Ok(Continue(()))
}
