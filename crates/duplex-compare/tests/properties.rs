//! Property tests for the comparator
//!
//! Schemas are generated first and values are generated to fit them, so
//! every schema shape is exercised against data it actually describes.

use chrono::{TimeZone, Utc};
use duplex_compare::{compare_values, ComparatorType, Schema, Value};
use proptest::prelude::*;

fn rule() -> impl Strategy<Value = ComparatorType> {
    prop_oneof![
        Just(ComparatorType::Entity),
        Just(ComparatorType::Counter),
        Just(ComparatorType::Ratio),
        Just(ComparatorType::Quantile),
        Just(ComparatorType::DateTime),
    ]
}

fn schema() -> impl Strategy<Value = Schema> {
    let leaf = prop_oneof![
        4 => rule().prop_map(Schema::Scalar),
        1 => Just(Schema::Set),
        1 => Just(Schema::Infer),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(Schema::list),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Schema::Tuple),
            prop::collection::btree_map("[a-z]{1,6}", inner.clone(), 1..4).prop_map(|fields| {
                Schema::Map {
                    fields,
                    wildcard: None,
                }
            }),
            inner.prop_map(Schema::wildcard),
        ]
    })
}

fn instant() -> impl Strategy<Value = Value> {
    (0_i64..2_000_000_000).prop_map(|secs| {
        Value::DateTime(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    })
}

fn inferable() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::Int),
        (0.0_f64..1e6).prop_map(Value::Float),
        "[a-z0-9.]{0,8}".prop_map(Value::Str),
        instant(),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Tuple),
            prop::collection::btree_set(any::<i64>().prop_map(Value::Int), 0..4)
                .prop_map(Value::Set),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Value::object),
        ]
    })
}

fn maybe_null(strategy: BoxedStrategy<Value>) -> BoxedStrategy<Value> {
    prop_oneof![1 => Just(Value::Null), 5 => strategy].boxed()
}

fn scalar_for(rule: ComparatorType) -> BoxedStrategy<Value> {
    let present = match rule {
        ComparatorType::Entity => prop_oneof![
            any::<i64>().prop_map(Value::Int),
            "[a-z0-9.]{0,8}".prop_map(Value::Str),
        ]
        .boxed(),
        ComparatorType::Counter => (0_i64..1_000_000).prop_map(Value::Int).boxed(),
        ComparatorType::Ratio => (0.0_f64..100.0).prop_map(Value::Float).boxed(),
        ComparatorType::Quantile => (0.0_f64..10_000.0).prop_map(Value::Float).boxed(),
        ComparatorType::DateTime => prop_oneof![
            instant(),
            instant().prop_map(|v| match v {
                Value::DateTime(dt) => Value::Str(dt.to_rfc3339()),
                other => other,
            }),
        ]
        .boxed(),
    };
    maybe_null(present)
}

fn value_for(schema: &Schema) -> BoxedStrategy<Value> {
    match schema {
        Schema::Infer => inferable().boxed(),
        Schema::Scalar(rule) => scalar_for(*rule),
        Schema::Set => maybe_null(
            prop::collection::btree_set("[a-z]{1,4}".prop_map(Value::Str), 0..4)
                .prop_map(Value::Set)
                .boxed(),
        ),
        Schema::List(element) => maybe_null(
            prop::collection::vec(value_for(element), 0..4)
                .prop_map(Value::List)
                .boxed(),
        ),
        Schema::Tuple(elements) => {
            let parts: Vec<_> = elements.iter().map(value_for).collect();
            maybe_null(parts.prop_map(Value::Tuple).boxed())
        }
        Schema::Map {
            fields,
            wildcard: None,
        } => {
            let names: Vec<String> = fields.keys().cloned().collect();
            let parts: Vec<_> = fields.values().map(value_for).collect();
            maybe_null(
                parts
                    .prop_map(move |values| Value::object(names.clone().into_iter().zip(values)))
                    .boxed(),
            )
        }
        Schema::Map {
            wildcard: Some(wildcard),
            ..
        } => maybe_null(
            prop::collection::btree_map("[a-z]{1,4}", value_for(wildcard), 0..4)
                .prop_map(Value::object)
                .boxed(),
        ),
    }
}

fn schema_and_value() -> impl Strategy<Value = (Schema, Value)> {
    schema().prop_flat_map(|schema| {
        let values = value_for(&schema);
        (Just(schema), values)
    })
}

proptest! {
    #[test]
    fn prop_comparison_is_reflexive((schema, value) in schema_and_value(), rollup in 0_i64..86_400) {
        let discrepancies = compare_values(&value, &value, &schema, rollup);
        prop_assert!(discrepancies.is_empty(), "{:?}", discrepancies);
    }

    #[test]
    fn prop_inferred_comparison_is_reflexive(value in inferable()) {
        prop_assert!(compare_values(&value, &value, &Schema::Infer, 3600).is_empty());
    }

    #[test]
    fn prop_one_absent_side_is_one_discrepancy((schema, value) in schema_and_value()) {
        prop_assume!(!value.is_null());
        prop_assert_eq!(compare_values(&value, &Value::Null, &schema, 3600).len(), 1);
        prop_assert_eq!(compare_values(&Value::Null, &value, &schema, 3600).len(), 1);
    }

    #[test]
    fn prop_counter_never_flags_within_absolute_slack(base in 0_i64..=10, delta in 0_i64..=3) {
        let schema = Schema::Scalar(ComparatorType::Counter);
        let p = Value::Int(base);
        let s = Value::Int((base + delta).min(10));
        prop_assert!(compare_values(&p, &s, &schema, 0).is_empty());
    }

    #[test]
    fn prop_negative_counters_always_flagged(neg in i64::MIN..0, other in 0_i64..1000) {
        let schema = Schema::Scalar(ComparatorType::Counter);
        prop_assert_eq!(compare_values(&Value::Int(neg), &Value::Int(other), &schema, 0).len(), 1);
        prop_assert_eq!(compare_values(&Value::Int(other), &Value::Int(neg), &schema, 0).len(), 1);
    }
}
