//! End-to-end validation scenarios across the shipped dialects.

use serde_json::{json, Value};

use sigil_schema::{Dialect, DocumentRegistry, SigilError, Validator};

fn draft7(schema: Value) -> Validator {
    Validator::options().dialect(Dialect::draft7()).build(schema)
}

fn draft202012(schema: Value) -> Validator {
    Validator::options()
        .dialect(Dialect::draft202012())
        .build(schema)
}

#[test]
fn reports_every_failure_with_messages_and_paths() {
    let validator = draft7(json!({
        "items": {"enum": [1, 2, 3]},
        "maxItems": 2
    }));
    let errors = validator.iter_errors(&json!([2, 3, 4])).unwrap();
    assert_eq!(errors.len(), 2);

    let enum_error = &errors.errors()[0];
    assert_eq!(enum_error.message(), "4 is not one of [1, 2, 3]");
    assert_eq!(enum_error.keyword(), "enum");
    assert_eq!(enum_error.instance_path().to_string(), "/2");
    assert_eq!(enum_error.schema_path().to_string(), "/items/enum");
    assert_eq!(enum_error.to_string(), "/2: 4 is not one of [1, 2, 3]");

    let length_error = &errors.errors()[1];
    assert_eq!(length_error.message(), "[2, 3, 4] is too long");
    assert_eq!(length_error.keyword(), "maxItems");
    assert!(length_error.instance_path().is_empty());
    assert_eq!(length_error.to_string(), "(root): [2, 3, 4] is too long");
}

#[test]
fn validate_raises_the_single_best_failure() {
    let validator = draft7(json!({"maxItems": 2}));
    let err = validator.validate(&json!([2, 3, 4])).unwrap_err();
    let SigilError::Validation(error) = err else {
        panic!("expected a validation failure");
    };
    assert_eq!(error.message(), "[2, 3, 4] is too long");
    assert_eq!(error.to_string(), "(root): [2, 3, 4] is too long");
}

#[test]
fn collected_errors_iterate_repeatedly() {
    let validator = draft7(json!({"type": "string", "minLength": 3}));
    let errors = validator.iter_errors(&json!(7)).unwrap();
    let first_pass: Vec<_> = errors.iter().map(|e| e.message().to_owned()).collect();
    let second_pass: Vec<_> = errors.iter().map(|e| e.message().to_owned()).collect();
    assert_eq!(first_pass, second_pass);
    assert_eq!(first_pass, vec!["7 is not of type \"string\""]);
}

#[test]
fn required_reports_each_missing_property() {
    let validator = draft7(json!({"required": ["a", "b", "c"]}));
    let errors = validator.iter_errors(&json!({"b": 1})).unwrap();
    let messages: Vec<_> = errors.iter().map(|e| e.message().to_owned()).collect();
    assert_eq!(
        messages,
        vec![
            "\"a\" is a required property",
            "\"c\" is a required property"
        ]
    );
}

#[test]
fn additional_properties_names_the_extras() {
    let validator = draft7(json!({
        "properties": {"known": true},
        "additionalProperties": false
    }));
    let errors = validator
        .iter_errors(&json!({"known": 1, "zeta": 2, "alpha": 3}))
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.errors()[0].message(),
        "Additional properties are not allowed (\"alpha\", \"zeta\" were unexpected)"
    );

    let errors = validator.iter_errors(&json!({"only": 1})).unwrap();
    assert_eq!(
        errors.errors()[0].message(),
        "Additional properties are not allowed (\"only\" was unexpected)"
    );
}

#[test]
fn pattern_properties_shape_the_paths() {
    let validator = draft7(json!({
        "patternProperties": {"^x-": {"type": "integer"}}
    }));
    let errors = validator.iter_errors(&json!({"x-rate": "fast"})).unwrap();
    assert_eq!(errors.len(), 1);
    let error = &errors.errors()[0];
    assert_eq!(error.instance_path().to_string(), "/x-rate");
    assert_eq!(
        error.schema_path().to_string(),
        "/patternProperties/^x-/type"
    );
}

#[test]
fn combinator_algebra() {
    let all = draft7(json!({"allOf": [{"minimum": 0}, {"maximum": 10}]}));
    assert!(all.is_valid(&json!(5)));
    assert!(!all.is_valid(&json!(-1)));
    assert!(!all.is_valid(&json!(11)));

    let any = draft7(json!({"anyOf": [{"type": "string"}, {"minimum": 0}]}));
    assert!(any.is_valid(&json!("text")));
    assert!(any.is_valid(&json!(3)));
    assert!(!any.is_valid(&json!(-3)));

    let none = draft7(json!({"not": {"type": "string"}}));
    assert!(none.is_valid(&json!(3)));
    assert!(!none.is_valid(&json!("text")));
    let errors = none.iter_errors(&json!("text")).unwrap();
    assert_eq!(
        errors.errors()[0].message(),
        "\"text\" should not be valid under {\"type\": \"string\"}"
    );
}

#[test]
fn one_of_demands_exactly_one_match() {
    let validator = draft7(json!({
        "oneOf": [{"type": "integer"}, {"type": "number", "minimum": 0}]
    }));
    assert!(validator.is_valid(&json!(-3)));
    assert!(validator.is_valid(&json!(0.5)));
    let errors = validator.iter_errors(&json!(3)).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.errors()[0].message(),
        "3 is valid under each of the schemas at indexes 0, 1"
    );

    let errors = validator.iter_errors(&json!("abc")).unwrap();
    let error = &errors.errors()[0];
    assert_eq!(
        error.message(),
        "\"abc\" is not valid under any of the given schemas"
    );
    assert_eq!(error.context().len(), 2);
    assert_eq!(
        error.context()[0].schema_path().to_string(),
        "/oneOf/0/type"
    );
    assert_eq!(
        error.context()[1].schema_path().to_string(),
        "/oneOf/1/type"
    );
}

#[test]
fn dependencies_in_both_forms() {
    let listed = draft7(json!({
        "dependencies": {"card": ["cvv", "expiry"]}
    }));
    assert!(listed.is_valid(&json!({"cash": true})));
    let errors = listed.iter_errors(&json!({"card": "4111"})).unwrap();
    let messages: Vec<_> = errors.iter().map(|e| e.message().to_owned()).collect();
    assert_eq!(
        messages,
        vec![
            "\"cvv\" is a dependency of \"card\"",
            "\"expiry\" is a dependency of \"card\""
        ]
    );

    let schema_form = draft7(json!({
        "dependencies": {"card": {"required": ["cvv"]}}
    }));
    assert!(!schema_form.is_valid(&json!({"card": "4111"})));
    assert!(schema_form.is_valid(&json!({"card": "4111", "cvv": "000"})));
}

#[test]
fn if_then_else_selects_a_branch() {
    let validator = draft7(json!({
        "if": {"properties": {"kind": {"const": "disk"}}},
        "then": {"required": ["path"]},
        "else": {"required": ["url"]}
    }));
    assert!(validator.is_valid(&json!({"kind": "disk", "path": "/dev/sda"})));
    assert!(!validator.is_valid(&json!({"kind": "disk"})));
    assert!(validator.is_valid(&json!({"kind": "net", "url": "https://x"})));

    let errors = validator.iter_errors(&json!({"kind": "disk"})).unwrap();
    // The branch failure is attributed to `then`, not `if`.
    assert_eq!(errors.errors()[0].schema_path().to_string(), "/then/required");
}

#[test]
fn draft4_exclusive_bounds_are_boolean_modifiers() {
    let validator = Validator::options()
        .dialect(Dialect::draft4())
        .build(json!({"maximum": 10, "exclusiveMaximum": true}));
    assert!(validator.is_valid(&json!(9)));
    assert!(!validator.is_valid(&json!(10)));
    let errors = validator.iter_errors(&json!(10)).unwrap();
    assert_eq!(
        errors.errors()[0].message(),
        "10 is greater than or equal to the maximum of 10"
    );
}

#[test]
fn legacy_items_with_additional_items() {
    let validator = draft7(json!({
        "items": [{"type": "string"}, {"type": "integer"}],
        "additionalItems": false
    }));
    assert!(validator.is_valid(&json!(["a", 1])));
    let errors = validator.iter_errors(&json!(["a", 1, true, null])).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.errors()[0].message(),
        "Additional items are not allowed (true, null were unexpected)"
    );
}

#[test]
fn prefix_items_with_closed_tail() {
    let validator = draft202012(json!({
        "prefixItems": [{"type": "string"}],
        "items": false
    }));
    assert!(validator.is_valid(&json!(["a"])));
    let errors = validator.iter_errors(&json!(["a", 1, 2])).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.errors()[0].message(),
        "Expected at most 1 items but found 2"
    );
    assert_eq!(errors.errors()[0].keyword(), "items");
}

#[test]
fn counted_contains() {
    let validator = draft202012(json!({
        "contains": {"type": "integer"},
        "minContains": 2,
        "maxContains": 3
    }));
    assert!(validator.is_valid(&json!([1, "a", 2])));
    assert!(!validator.is_valid(&json!([1, "a"])));
    assert!(!validator.is_valid(&json!([1, 2, 3, 4])));

    let errors = validator.iter_errors(&json!([1, "a"])).unwrap();
    assert_eq!(
        errors.errors()[0].message(),
        "Too few items match the given schema (expected at least 2 but only 1 matched)"
    );

    let errors = validator.iter_errors(&json!([1, 2, 3, 4])).unwrap();
    assert_eq!(errors.errors()[0].keyword(), "maxContains");

    let errors = validator.iter_errors(&json!(["a", "b"])).unwrap();
    assert_eq!(
        errors.errors()[0].message(),
        "[\"a\", \"b\"] does not contain items matching the given schema"
    );
}

#[test]
fn dependent_keywords_split_in_2020_12() {
    let validator = draft202012(json!({
        "dependentRequired": {"card": ["cvv"]},
        "dependentSchemas": {"card": {"properties": {"cvv": {"minLength": 3}}}}
    }));
    assert!(!validator.is_valid(&json!({"card": "4111"})));
    assert!(!validator.is_valid(&json!({"card": "4111", "cvv": "0"})));
    assert!(validator.is_valid(&json!({"card": "4111", "cvv": "000"})));
}

#[test]
fn self_identified_schema_resolves_its_own_name() {
    // A document whose $id is also the target of its own $ref must
    // resolve in place and terminate.
    let validator = draft7(json!({
        "$id": "n",
        "properties": {"next": {"$ref": "n"}},
        "type": "object"
    }));
    assert!(validator.is_valid(&json!({"next": {"next": {}}})));
    assert!(!validator.is_valid(&json!({"next": 3})));
}

#[test]
fn nested_id_changes_the_resolution_base() {
    let mut registry = DocumentRegistry::new();
    registry
        .register(json!({"$id": "https://example.com/defs/leaf", "type": "integer"}))
        .unwrap();
    let validator = Validator::options()
        .dialect(Dialect::draft7())
        .registry(registry)
        .build(json!({
            "$id": "https://example.com/root",
            "properties": {
                "inner": {
                    "$id": "defs/holder",
                    "properties": {"value": {"$ref": "leaf"}}
                }
            }
        }));
    assert!(validator.is_valid(&json!({"inner": {"value": 3}})));
    assert!(!validator.is_valid(&json!({"inner": {"value": "x"}})));
}

#[test]
fn dynamic_ref_resolves_through_the_dynamic_scope() {
    let validator = draft202012(json!({
        "$defs": {
            "typed": {"$dynamicAnchor": "node", "type": "integer"}
        },
        "properties": {"value": {"$dynamicRef": "#node"}}
    }));
    assert!(validator.is_valid(&json!({"value": 3})));
    assert!(!validator.is_valid(&json!({"value": "x"})));
}

#[test]
fn extended_dialects_validate_independently() {
    let quiet = Dialect::draft7()
        .extend("draft7-no-type")
        .spec_uri("https://example.com/no-type")
        .remove_keyword("type")
        .build();
    let schema = json!({"type": "integer"});
    let strict = draft7(schema.clone());
    let lax = Validator::options().dialect(quiet).build(schema);
    assert!(!strict.is_valid(&json!("text")));
    assert!(lax.is_valid(&json!("text")));
}

#[test]
fn custom_type_vocabulary() {
    let types = Dialect::draft7()
        .type_checker()
        .redefine("even", |v| v.as_i64().is_some_and(|n| n % 2 == 0));
    let dialect = Dialect::draft7()
        .extend("draft7-even")
        .spec_uri("https://example.com/even")
        .type_checker(types)
        .build();
    let validator = Validator::options()
        .dialect(dialect)
        .build(json!({"type": "even"}));
    assert!(validator.is_valid(&json!(4)));
    assert!(!validator.is_valid(&json!(3)));
}

#[test]
fn unknown_type_names_are_fatal() {
    let validator = draft7(json!({"type": "quantity"}));
    let err = validator.iter_errors(&json!(1)).unwrap_err();
    assert!(matches!(err, SigilError::UnknownType { name } if name == "quantity"));
}

#[test]
fn meta_validation_round_trip() {
    for dialect in [Dialect::draft4(), Dialect::draft7(), Dialect::draft202012()] {
        let good = Validator::options()
            .dialect(dialect.clone())
            .build(json!({"properties": {"n": {"minimum": 0}}}));
        assert!(good.check_schema().is_ok(), "{}", dialect.name());

        let bad = Validator::options()
            .dialect(dialect.clone())
            .build(json!({"properties": {"n": {"minimum": []}}}));
        assert!(bad.check_schema().is_err(), "{}", dialect.name());
    }
}

#[test]
fn unicode_lengths_count_characters() {
    let validator = draft7(json!({"maxLength": 3}));
    assert!(validator.is_valid(&json!("héé")));
    assert!(!validator.is_valid(&json!("hééé")));
}

#[test]
fn numeric_equality_crosses_representations() {
    let validator = draft7(json!({"enum": [1, 2.5]}));
    assert!(validator.is_valid(&json!(1.0)));
    assert!(validator.is_valid(&json!(2.5)));
    assert!(!validator.is_valid(&json!(true)), "booleans are not numbers");

    let constant = draft7(json!({"const": 1}));
    assert!(constant.is_valid(&json!(1.0)));
    assert!(!constant.is_valid(&json!(true)));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arbitrary_instance() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            "[a-z]{0,8}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn is_valid_agrees_with_iter_errors(instance in arbitrary_instance()) {
            let validator = draft7(json!({
                "type": ["object", "array", "integer"],
                "properties": {"a": {"type": "integer", "minimum": 0}},
                "items": {"type": ["string", "integer"]},
                "minimum": -1000
            }));
            let errors = validator.iter_errors(&instance).unwrap();
            prop_assert_eq!(validator.is_valid(&instance), errors.is_empty());
        }

        #[test]
        fn error_paths_point_into_the_instance(instance in arbitrary_instance()) {
            let validator = draft7(json!({
                "properties": {"a": {"type": "integer"}},
                "items": {"type": "string"}
            }));
            for error in &validator.iter_errors(&instance).unwrap() {
                prop_assert!(
                    error.instance_path().lookup(&instance).is_some(),
                    "dangling instance path {}",
                    error.instance_path()
                );
            }
        }
    }
}
