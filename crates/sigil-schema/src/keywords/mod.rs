//! # Keyword Validators
//!
//! One validation function per keyword, grouped by family:
//!
//! - `assertions` — leaf constraints (`type`, `enum`, bounds, lengths).
//! - `applicators` — keywords that recurse into sub-schemas
//!   (`properties`, `items`, the combinators).
//! - `reference` — `$ref` and `$dynamicRef`.
//!
//! Each dialect owns its own keyword map, assembled here. Dispatch walks
//! the keywords present in a schema object, looks each up in the dialect's
//! map, and ignores anything unregistered — unknown keys are
//! forward-compatible, never errors. Every present, recognized keyword is
//! evaluated regardless of earlier failures unless the sink halts
//! traversal.

pub(crate) mod applicators;
pub(crate) mod assertions;
pub(crate) mod reference;

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ErrorSink, SigilResult};
use crate::validator::Context;

/// A keyword validation function.
///
/// Arguments: the per-call context, the keyword's value in the schema, the
/// instance under test, the parent schema object, and the failure sink.
/// Ordinary failures are reported into the sink; the `Result` channel is
/// reserved for fatal conditions (unknown types, unresolvable references).
pub type KeywordFn = Arc<
    dyn for<'a> Fn(
            &mut Context<'a>,
            &Value,
            &Value,
            &Value,
            &mut dyn ErrorSink,
        ) -> SigilResult<ControlFlow<()>>
        + Send
        + Sync,
>;

/// Map from keyword name to its validator.
pub type KeywordMap = BTreeMap<String, KeywordFn>;

fn add(
    map: &mut KeywordMap,
    name: &str,
    keyword: impl for<'a> Fn(
            &mut Context<'a>,
            &Value,
            &Value,
            &Value,
            &mut dyn ErrorSink,
        ) -> SigilResult<ControlFlow<()>>
        + Send
        + Sync
        + 'static,
) {
    map.insert(name.to_owned(), Arc::new(keyword));
}

/// Keywords shared by every shipped dialect.
fn common() -> KeywordMap {
    let mut map = KeywordMap::new();
    add(&mut map, "type", assertions::type_);
    add(&mut map, "enum", assertions::enum_);
    add(&mut map, "multipleOf", assertions::multiple_of);
    add(&mut map, "maxLength", assertions::max_length);
    add(&mut map, "minLength", assertions::min_length);
    add(&mut map, "pattern", assertions::pattern);
    add(&mut map, "maxItems", assertions::max_items);
    add(&mut map, "minItems", assertions::min_items);
    add(&mut map, "uniqueItems", assertions::unique_items);
    add(&mut map, "maxProperties", assertions::max_properties);
    add(&mut map, "minProperties", assertions::min_properties);
    add(&mut map, "required", assertions::required);
    add(&mut map, "format", assertions::format);
    add(&mut map, "properties", applicators::properties);
    add(&mut map, "patternProperties", applicators::pattern_properties);
    add(&mut map, "additionalProperties", applicators::additional_properties);
    add(&mut map, "allOf", applicators::all_of);
    add(&mut map, "anyOf", applicators::any_of);
    add(&mut map, "oneOf", applicators::one_of);
    add(&mut map, "not", applicators::not_);
    add(&mut map, "$ref", reference::ref_);
    map
}

/// Draft 4 keyword set: boolean-modifier exclusive bounds, array-form
/// `items`/`additionalItems`, `dependencies`; no `const`, `contains`,
/// `if`, or `propertyNames`.
pub(crate) fn draft4() -> KeywordMap {
    let mut map = common();
    add(&mut map, "maximum", assertions::maximum_draft4);
    add(&mut map, "minimum", assertions::minimum_draft4);
    add(&mut map, "items", applicators::items_prefixed);
    add(&mut map, "additionalItems", applicators::additional_items);
    add(&mut map, "dependencies", assertions::dependencies);
    map
}

/// Draft 7 keyword set.
pub(crate) fn draft7() -> KeywordMap {
    let mut map = common();
    add(&mut map, "maximum", assertions::maximum);
    add(&mut map, "minimum", assertions::minimum);
    add(&mut map, "exclusiveMaximum", assertions::exclusive_maximum);
    add(&mut map, "exclusiveMinimum", assertions::exclusive_minimum);
    add(&mut map, "const", assertions::const_);
    add(&mut map, "contains", applicators::contains);
    add(&mut map, "propertyNames", applicators::property_names);
    add(&mut map, "if", applicators::if_then_else);
    add(&mut map, "items", applicators::items_prefixed);
    add(&mut map, "additionalItems", applicators::additional_items);
    add(&mut map, "dependencies", assertions::dependencies);
    map
}

/// Draft 2020-12 keyword set: `prefixItems` with schema-form `items`,
/// split `dependentRequired`/`dependentSchemas`, counted `contains`,
/// `$dynamicRef`.
pub(crate) fn draft202012() -> KeywordMap {
    let mut map = common();
    add(&mut map, "maximum", assertions::maximum);
    add(&mut map, "minimum", assertions::minimum);
    add(&mut map, "exclusiveMaximum", assertions::exclusive_maximum);
    add(&mut map, "exclusiveMinimum", assertions::exclusive_minimum);
    add(&mut map, "const", assertions::const_);
    add(&mut map, "contains", applicators::contains_counted);
    add(&mut map, "propertyNames", applicators::property_names);
    add(&mut map, "if", applicators::if_then_else);
    add(&mut map, "prefixItems", applicators::prefix_items);
    add(&mut map, "items", applicators::items_remaining);
    add(&mut map, "dependentRequired", assertions::dependent_required);
    add(&mut map, "dependentSchemas", applicators::dependent_schemas);
    add(&mut map, "$dynamicRef", reference::dynamic_ref);
    map
}
