//! `$ref` and `$dynamicRef`.
//!
//! Both delegate resolution to the session resolver and validation of the
//! target to [`Context::validate_resolved`], which owns the base-URI swap
//! and the reference-cycle guard. A reference that cannot be resolved is
//! fatal: it travels the `Result` channel, not the sink.

use std::ops::ControlFlow::{self, Continue};

use serde_json::Value;

use crate::error::{ErrorSink, SigilResult};
use crate::validator::Context;

pub(crate) fn ref_(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> SigilResult<ControlFlow<()>> {
    let Value::String(reference) = kw else {
        return Ok(Continue(()));
    };
    let resolution = cx.resolve(reference)?;
    cx.validate_resolved(resolution, instance, sink)
}

pub(crate) fn dynamic_ref(
    cx: &mut Context<'_>,
    kw: &Value,
    instance: &Value,
    _schema: &Value,
    sink: &mut dyn ErrorSink,
) -> SigilResult<ControlFlow<()>> {
    let Value::String(reference) = kw else {
        return Ok(Continue(()));
    };
    let resolution = cx.resolve_dynamic(reference)?;
    cx.validate_resolved(resolution, instance, sink)
}
