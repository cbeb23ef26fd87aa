//! Leaf assertion keywords: type and value constraints that never recurse
//! into sub-schemas (with the exception of schema-form `dependencies`,
//! which descends for compatibility with the pre-split drafts).
//!
//! Message wording is part of the engine's contract — snapshot tests rely
//! on it — so changes here are breaking.

use std::cmp::Ordering;
use std::ops::ControlFlow::{self, Continue};

use serde_json::Value;
use tracing::debug;

use sigil_core::{json_equal, num_cmp, render_value, PathChunk};

use crate::error::{ErrorSink, SigilResult, ValidationError};
use crate::validator::Context;

type Flow = SigilResult<ControlFlow<()>>;

fn fail(sink: &mut dyn ErrorSink, message: String) -> Flow {
    Ok(sink.report(ValidationError::new(message)))
}

pub(crate) fn type_(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let names: Vec<&str> = match kw {
        Value::String(name) => vec![name.as_str()],
        Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
        _ => return Ok(Continue(())),
    };
    for name in &names {
        if cx.is_type(instance, name)? {
            return Ok(Continue(()));
        }
    }
    let expected = names
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ");
    fail(
        sink,
        format!("{} is not of type {expected}", render_value(instance)),
    )
}

pub(crate) fn enum_(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let Value::Array(choices) = kw else {
        return Ok(Continue(()));
    };
    if choices.iter().any(|choice| json_equal(choice, instance)) {
        return Ok(Continue(()));
    }
    fail(
        sink,
        format!(
            "{} is not one of {}",
            render_value(instance),
            render_value(kw)
        ),
    )
}

pub(crate) fn const_(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    if json_equal(kw, instance) {
        return Ok(Continue(()));
    }
    fail(sink, format!("{} was expected", render_value(kw)))
}

pub(crate) fn multiple_of(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Number(n), Value::Number(m)) = (instance, kw) else {
        return Ok(Continue(()));
    };
    let failed = if let (Some(x), Some(y)) = (n.as_i64(), m.as_i64()) {
        // checked_rem: i64::MIN % -1 overflows, and MIN is a multiple of -1.
        x.checked_rem(y).is_some_and(|r| r != 0)
    } else if let (Some(x), Some(y)) = (n.as_u64(), m.as_u64()) {
        y != 0 && x % y != 0
    } else {
        match (n.as_f64(), m.as_f64()) {
            (Some(x), Some(y)) if y != 0.0 => (x / y).fract() != 0.0,
            _ => false,
        }
    };
    if !failed {
        return Ok(Continue(()));
    }
    fail(
        sink,
        format!("{n} is not a multiple of {m}"),
    )
}

fn compare(instance: &Value, kw: &Value) -> Option<Ordering> {
    match (instance, kw) {
        (Value::Number(n), Value::Number(limit)) => num_cmp(n, limit),
        _ => None,
    }
}

pub(crate) fn maximum(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    if compare(instance, kw) == Some(Ordering::Greater) {
        return fail(
            sink,
            format!(
                "{} is greater than the maximum of {}",
                render_value(instance),
                render_value(kw)
            ),
        );
    }
    Ok(Continue(()))
}

pub(crate) fn exclusive_maximum(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    if matches!(
        compare(instance, kw),
        Some(Ordering::Greater | Ordering::Equal)
    ) {
        return fail(
            sink,
            format!(
                "{} is greater than or equal to the exclusive maximum of {}",
                render_value(instance),
                render_value(kw)
            ),
        );
    }
    Ok(Continue(()))
}

pub(crate) fn minimum(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    if compare(instance, kw) == Some(Ordering::Less) {
        return fail(
            sink,
            format!(
                "{} is less than the minimum of {}",
                render_value(instance),
                render_value(kw)
            ),
        );
    }
    Ok(Continue(()))
}

pub(crate) fn exclusive_minimum(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    if matches!(compare(instance, kw), Some(Ordering::Less | Ordering::Equal)) {
        return fail(
            sink,
            format!(
                "{} is less than or equal to the exclusive minimum of {}",
                render_value(instance),
                render_value(kw)
            ),
        );
    }
    Ok(Continue(()))
}

/// Draft 4 `maximum`: a sibling boolean `exclusiveMaximum` tightens the
/// bound. Later drafts made the exclusive bound its own numeric keyword.
pub(crate) fn maximum_draft4(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let exclusive = schema
        .get("exclusiveMaximum")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let ordering = compare(instance, kw);
    let failed = if exclusive {
        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
    } else {
        ordering == Some(Ordering::Greater)
    };
    if !failed {
        return Ok(Continue(()));
    }
    let relation = if exclusive {
        "greater than or equal to"
    } else {
        "greater than"
    };
    fail(
        sink,
        format!(
            "{} is {relation} the maximum of {}",
            render_value(instance),
            render_value(kw)
        ),
    )
}

/// Draft 4 `minimum`, see [`maximum_draft4`].
pub(crate) fn minimum_draft4(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let exclusive = schema
        .get("exclusiveMinimum")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let ordering = compare(instance, kw);
    let failed = if exclusive {
        matches!(ordering, Some(Ordering::Less | Ordering::Equal))
    } else {
        ordering == Some(Ordering::Less)
    };
    if !failed {
        return Ok(Continue(()));
    }
    let relation = if exclusive {
        "less than or equal to"
    } else {
        "less than"
    };
    fail(
        sink,
        format!(
            "{} is {relation} the minimum of {}",
            render_value(instance),
            render_value(kw)
        ),
    )
}

pub(crate) fn max_length(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::String(s), Some(limit)) = (instance, kw.as_u64()) else {
        return Ok(Continue(()));
    };
    // Length is in unicode scalar values, not bytes.
    if s.chars().count() as u64 > limit {
        return fail(sink, format!("{} is too long", render_value(instance)));
    }
    Ok(Continue(()))
}

pub(crate) fn min_length(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::String(s), Some(limit)) = (instance, kw.as_u64()) else {
        return Ok(Continue(()));
    };
    if (s.chars().count() as u64) < limit {
        return fail(sink, format!("{} is too short", render_value(instance)));
    }
    Ok(Continue(()))
}

pub(crate) fn pattern(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::String(s), Value::String(pattern)) = (instance, kw) else {
        return Ok(Continue(()));
    };
    let re = match regex::Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => {
            // An uncompilable pattern is the meta-schema's problem; it
            // cannot reject instances.
            debug!(pattern, error = %err, "skipping uncompilable pattern");
            return Ok(Continue(()));
        }
    };
    if re.is_match(s) {
        return Ok(Continue(()));
    }
    fail(
        sink,
        format!(
            "{} does not match {}",
            render_value(instance),
            render_value(kw)
        ),
    )
}

pub(crate) fn max_items(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Array(items), Some(limit)) = (instance, kw.as_u64()) else {
        return Ok(Continue(()));
    };
    if items.len() as u64 > limit {
        return fail(sink, format!("{} is too long", render_value(instance)));
    }
    Ok(Continue(()))
}

pub(crate) fn min_items(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Array(items), Some(limit)) = (instance, kw.as_u64()) else {
        return Ok(Continue(()));
    };
    if (items.len() as u64) < limit {
        return fail(sink, format!("{} is too short", render_value(instance)));
    }
    Ok(Continue(()))
}

pub(crate) fn unique_items(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Array(items), Some(true)) = (instance, kw.as_bool()) else {
        return Ok(Continue(()));
    };
    for (i, a) in items.iter().enumerate() {
        if items[i + 1..].iter().any(|b| json_equal(a, b)) {
            return fail(
                sink,
                format!("{} has non-unique elements", render_value(instance)),
            );
        }
    }
    Ok(Continue(()))
}

pub(crate) fn max_properties(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Object(map), Some(limit)) = (instance, kw.as_u64()) else {
        return Ok(Continue(()));
    };
    if map.len() as u64 > limit {
        return fail(
            sink,
            format!("{} has too many properties", render_value(instance)),
        );
    }
    Ok(Continue(()))
}

pub(crate) fn min_properties(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Object(map), Some(limit)) = (instance, kw.as_u64()) else {
        return Ok(Continue(()));
    };
    if (map.len() as u64) < limit {
        return fail(
            sink,
            format!("{} does not have enough properties", render_value(instance)),
        );
    }
    Ok(Continue(()))
}

pub(crate) fn required(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Object(map), Value::Array(names)) = (instance, kw) else {
        return Ok(Continue(()));
    };
    // One failure per missing property, in keyword order.
    for name in names.iter().filter_map(Value::as_str) {
        if !map.contains_key(name) {
            if sink
                .report(ValidationError::new(format!(
                    "\"{name}\" is a required property"
                )))
                .is_break()
            {
                return Ok(ControlFlow::Break(()));
            }
        }
    }
    Ok(Continue(()))
}

pub(crate) fn format(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    if !cx.formats_enabled() {
        return Ok(Continue(()));
    }
    let Value::String(name) = kw else {
        return Ok(Continue(()));
    };
    if cx.format_conforms(instance, name) {
        return Ok(Continue(()));
    }
    fail(
        sink,
        format!("{} is not a \"{name}\"", render_value(instance)),
    )
}

/// Draft 4/7 `dependencies`: per triggering property, either a list of
/// required property names or a full schema applied to the whole object.
pub(crate) fn dependencies(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Object(map), Value::Object(deps)) = (instance, kw) else {
        return Ok(Continue(()));
    };
    for (trigger, dependency) in deps {
        if !map.contains_key(trigger) {
            continue;
        }
        match dependency {
            Value::Array(names) => {
                for name in names.iter().filter_map(Value::as_str) {
                    if !map.contains_key(name) {
                        if sink
                            .report(ValidationError::new(format!(
                                "\"{name}\" is a dependency of \"{trigger}\""
                            )))
                            .is_break()
                        {
                            return Ok(ControlFlow::Break(()));
                        }
                    }
                }
            }
            subschema => {
                let flow = cx.descend(
                    subschema,
                    instance,
                    None,
                    &[PathChunk::Property(trigger.clone())],
                    sink,
                )?;
                if flow.is_break() {
                    return Ok(ControlFlow::Break(()));
                }
            }
        }
    }
    Ok(Continue(()))
}

/// Draft 2020-12 `dependentRequired`: the list half of `dependencies`.
pub(crate) fn dependent_required(
    _cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> Flow {
    let (Value::Object(map), Value::Object(deps)) = (instance, kw) else {
        return Ok(Continue(()));
    };
    for (trigger, names) in deps {
        if !map.contains_key(trigger) {
            continue;
        }
        let Value::Array(names) = names else {
            continue;
        };
        for name in names.iter().filter_map(Value::as_str) {
            if !map.contains_key(name) {
                if sink
                    .report(ValidationError::new(format!(
                        "\"{name}\" is a dependency of \"{trigger}\""
                    )))
                    .is_break()
                {
                    return Ok(ControlFlow::Break(()));
                }
            }
        }
    }
    Ok(Continue(()))
}
