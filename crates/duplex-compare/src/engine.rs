//! Recursive structural comparison
//!
//! [`compare`] walks two [`Value`] trees under a [`Schema`] and collects every
//! discrepancy in the subtree. The engine is total: unsupported shapes are
//! reported as discrepancies, never as errors or panics.

use crate::discrepancy::{index_path, key_path, shown, Discrepancy, DiscrepancyKind};
use crate::rules::compare_scalar;
use crate::schema::Schema;
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};

static NULL: Value = Value::Null;
static INFER: Schema = Schema::Infer;

/// Compare two values from the root path
#[inline]
#[must_use]
pub fn compare_values(
    primary: &Value,
    secondary: &Value,
    schema: &Schema,
    rollup_secs: i64,
) -> Vec<Discrepancy> {
    compare(primary, secondary, "", schema, rollup_secs)
}

/// Compare two values at `path`
///
/// # Dispatch
/// 1. With no schema and an absent primary, the values match iff the
///    secondary is absent too.
/// 2. The schema (or, without one, the primary's shape) selects scalar,
///    tuple, list, set or mapping comparison.
#[must_use]
pub fn compare(
    primary: &Value,
    secondary: &Value,
    path: &str,
    schema: &Schema,
    rollup_secs: i64,
) -> Vec<Discrepancy> {
    match schema {
        Schema::Infer => match primary {
            Value::Null => {
                if secondary.is_null() {
                    Vec::new()
                } else {
                    vec![Discrepancy::new(
                        path,
                        DiscrepancyKind::Unmatched,
                        format!(
                            "unmatched field at path {}, primary=None, secondary={secondary}",
                            shown(path)
                        ),
                    )]
                }
            }
            Value::Bool(_)
            | Value::Int(_)
            | Value::UInt(_)
            | Value::Float(_)
            | Value::Str(_)
            | Value::DateTime(_) => {
                compare_scalar(primary, secondary, rollup_secs, path, None)
                    .into_iter()
                    .collect()
            }
            Value::Tuple(_) => compare_tuples(primary, secondary, rollup_secs, path, None),
            Value::List(_) => compare_lists(primary, secondary, rollup_secs, path, &INFER),
            Value::Set(_) => compare_sets(primary, secondary, path),
            Value::Map(_) => compare_maps(primary, secondary, rollup_secs, path, None),
        },
        Schema::Scalar(rule) => compare_scalar(primary, secondary, rollup_secs, path, Some(*rule))
            .into_iter()
            .collect(),
        Schema::Tuple(elements) => {
            compare_tuples(primary, secondary, rollup_secs, path, Some(elements))
        }
        Schema::List(element) => compare_lists(primary, secondary, rollup_secs, path, element),
        Schema::Set => compare_sets(primary, secondary, path),
        Schema::Map { fields, wildcard } => compare_maps(
            primary,
            secondary,
            rollup_secs,
            path,
            Some((fields, wildcard.as_deref())),
        ),
    }
}

/// Absence and shape checks shared by tuples and lists
///
/// Returns the element slices when element-wise comparison should proceed,
/// or the final result otherwise.
fn sequence_pair<'a>(
    primary: &'a Value,
    secondary: &'a Value,
    path: &str,
) -> Result<(&'a [Value], &'a [Value]), Vec<Discrepancy>> {
    match (primary.is_null(), secondary.is_null()) {
        (true, true) => return Err(Vec::new()),
        (true, false) => {
            return Err(vec![Discrepancy::new(
                path,
                DiscrepancyKind::Unmatched,
                format!("field {} only present in secondary implementation", shown(path)),
            )])
        }
        (false, true) => {
            return Err(vec![Discrepancy::new(
                path,
                DiscrepancyKind::Unmatched,
                format!("field {} missing from secondary implementation", shown(path)),
            )])
        }
        (false, false) => {}
    }

    let (Some(p), Some(s)) = (primary.as_sequence(), secondary.as_sequence()) else {
        return Err(vec![Discrepancy::new(
            path,
            DiscrepancyKind::TypeMismatch,
            format!(
                "invalid sequence types at path {} primary={}, secondary={}",
                shown(path),
                primary.kind_name(),
                secondary.kind_name()
            ),
        )]);
    };

    if p.len() != s.len() {
        return Err(vec![Discrepancy::new(
            path,
            DiscrepancyKind::LengthMismatch,
            format!(
                "different length for sequence on path {}, primary={}, secondary={}",
                shown(path),
                p.len(),
                s.len()
            ),
        )]);
    }

    Ok((p, s))
}

fn compare_tuples(
    primary: &Value,
    secondary: &Value,
    rollup_secs: i64,
    path: &str,
    schema: Option<&[Schema]>,
) -> Vec<Discrepancy> {
    let (p, s) = match sequence_pair(primary, secondary, path) {
        Ok(pair) => pair,
        Err(done) => return done,
    };

    if let Some(elements) = schema {
        if elements.len() != p.len() {
            return vec![Discrepancy::new(
                path,
                DiscrepancyKind::Unsupported,
                format!(
                    "tuple schema with {} elements does not fit values with {} elements at path {}",
                    elements.len(),
                    p.len(),
                    shown(path)
                ),
            )];
        }
    }

    let mut errors = Vec::new();
    for (idx, (p_item, s_item)) in p.iter().zip(s).enumerate() {
        let child_schema = schema.map_or(&INFER, |elements| &elements[idx]);
        errors.extend(compare(
            p_item,
            s_item,
            &index_path(path, idx),
            child_schema,
            rollup_secs,
        ));
    }
    errors
}

fn compare_lists(
    primary: &Value,
    secondary: &Value,
    rollup_secs: i64,
    path: &str,
    element: &Schema,
) -> Vec<Discrepancy> {
    let (p, s) = match sequence_pair(primary, secondary, path) {
        Ok(pair) => pair,
        Err(done) => return done,
    };

    let mut errors = Vec::new();
    for (idx, (p_item, s_item)) in p.iter().zip(s).enumerate() {
        errors.extend(compare(p_item, s_item, &index_path(path, idx), element, rollup_secs));
    }
    errors
}

fn as_set(value: &Value) -> Option<BTreeSet<&Value>> {
    match value {
        Value::Set(items) => Some(items.iter().collect()),
        Value::Tuple(items) | Value::List(items) => Some(items.iter().collect()),
        _ => None,
    }
}

fn compare_sets(primary: &Value, secondary: &Value, path: &str) -> Vec<Discrepancy> {
    let equal = match (as_set(primary), as_set(secondary)) {
        (Some(p), Some(s)) => p == s,
        _ => primary == secondary,
    };
    if equal {
        return Vec::new();
    }
    vec![Discrepancy::new(
        path,
        DiscrepancyKind::ValueMismatch,
        format!(
            "different values found at path {} primary={primary}, secondary={secondary}",
            shown(path)
        ),
    )]
}

type MapSchema<'a> = (&'a BTreeMap<String, Schema>, Option<&'a Schema>);

fn field_schema<'a>(schema: Option<MapSchema<'a>>, key: &Value) -> &'a Schema {
    let Some((fields, wildcard)) = schema else {
        return &INFER;
    };
    let explicit = match key {
        Value::Str(name) => fields.get(name),
        _ => None,
    };
    explicit.or(wildcard).unwrap_or(&INFER)
}

fn compare_maps(
    primary: &Value,
    secondary: &Value,
    rollup_secs: i64,
    path: &str,
    schema: Option<MapSchema<'_>>,
) -> Vec<Discrepancy> {
    match (primary.is_null(), secondary.is_null()) {
        (true, true) => return Vec::new(),
        (true, false) => {
            return vec![Discrepancy::new(
                path,
                DiscrepancyKind::Unmatched,
                format!("field {} only present in secondary implementation", shown(path)),
            )]
        }
        (false, true) => {
            return vec![Discrepancy::new(
                path,
                DiscrepancyKind::Unmatched,
                format!("field {} missing from secondary implementation", shown(path)),
            )]
        }
        (false, false) => {}
    }

    let Some(s_map) = secondary.as_map() else {
        return vec![Discrepancy::new(
            path,
            DiscrepancyKind::TypeMismatch,
            format!(
                "invalid type of secondary at path {} expecting a mapping, found a {}",
                shown(path),
                secondary.kind_name()
            ),
        )];
    };
    let Some(p_map) = primary.as_map() else {
        return vec![Discrepancy::new(
            path,
            DiscrepancyKind::TypeMismatch,
            format!(
                "invalid type of primary at path {} expecting a mapping, found a {}",
                shown(path),
                primary.kind_name()
            ),
        )];
    };

    // Without any explicit field every primary key is visited.
    let iterate_all = match schema {
        None => true,
        Some((fields, wildcard)) => wildcard.is_some() || fields.is_empty(),
    };

    let mut errors = Vec::new();
    if iterate_all {
        // Only the counts are checked; a key missing on the secondary side
        // surfaces as an absent value below.
        if p_map.len() != s_map.len() {
            return vec![Discrepancy::new(
                path,
                DiscrepancyKind::KeyCountMismatch,
                format!(
                    "different number of keys in mappings at path {} primary={}, secondary={}",
                    shown(path),
                    p_map.len(),
                    s_map.len()
                ),
            )];
        }
        for (key, p_val) in p_map {
            let s_val = s_map.get(key).unwrap_or(&NULL);
            errors.extend(compare(
                p_val,
                s_val,
                &key_path(path, key),
                field_schema(schema, key),
                rollup_secs,
            ));
        }
    } else if let Some((fields, _)) = schema {
        for (name, child_schema) in fields {
            let key = Value::Str(name.clone());
            let p_val = p_map.get(&key).unwrap_or(&NULL);
            let s_val = s_map.get(&key).unwrap_or(&NULL);
            errors.extend(compare(
                p_val,
                s_val,
                &key_path(path, &key),
                child_schema,
                rollup_secs,
            ));
        }
    }
    errors
}
