//! Comparison schemas
//!
//! A [`Schema`] describes how two values at a given path are compared. It is
//! built inline for every backend operation and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Key that marks the wildcard entry in the JSON schema notation
pub const WILDCARD_KEY: &str = "*";

/// Key that marks a tuple in the JSON schema notation
pub const TUPLE_KEY: &str = "$tuple";

/// Scalar comparison strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparatorType {
    /// Exact equality (identifiers, strings)
    Entity,
    /// Integer counts with small-number slack
    Counter,
    /// Derived float, relative tolerance
    Ratio,
    /// Percentile value, same tolerance as ratios
    Quantile,
    /// Instant, tolerance equal to the rollup
    DateTime,
}

impl ComparatorType {
    /// Name used in the JSON notation
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Counter => "counter",
            Self::Ratio => "ratio",
            Self::Quantile => "quantile",
            Self::DateTime => "datetime",
        }
    }
}

impl fmt::Display for ComparatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparatorType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entity" => Ok(Self::Entity),
            "counter" => Ok(Self::Counter),
            "ratio" => Ok(Self::Ratio),
            "quantile" => Ok(Self::Quantile),
            "datetime" => Ok(Self::DateTime),
            other => Err(SchemaError::UnknownRule(other.to_string())),
        }
    }
}

/// Recursive comparison schema
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Schema {
    /// No schema: pick the strategy from the primary value's shape
    #[default]
    Infer,
    /// Scalar leaf compared with a tolerance rule
    Scalar(ComparatorType),
    /// Homogeneous sequence, every element compared with one schema
    List(Box<Schema>),
    /// Fixed-arity sequence, position `i` compared with element `i`
    Tuple(Vec<Schema>),
    /// Unordered collection compared by set equality
    Set,
    /// Keyed mapping
    Map {
        /// Schemas for explicitly named keys
        fields: BTreeMap<String, Schema>,
        /// Schema for keys not listed in `fields`
        wildcard: Option<Box<Schema>>,
    },
}

impl From<ComparatorType> for Schema {
    #[inline]
    fn from(rule: ComparatorType) -> Self {
        Self::Scalar(rule)
    }
}

impl Schema {
    /// List schema
    #[inline]
    #[must_use]
    pub fn list(element: impl Into<Schema>) -> Self {
        Self::List(Box::new(element.into()))
    }

    /// Tuple schema
    #[must_use]
    pub fn tuple<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Schema>,
    {
        Self::Tuple(elements.into_iter().map(Into::into).collect())
    }

    /// Map schema with explicit fields only
    #[must_use]
    pub fn fields<I, K, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<Schema>,
    {
        Self::Map {
            fields: fields
                .into_iter()
                .map(|(k, s)| (k.into(), s.into()))
                .collect(),
            wildcard: None,
        }
    }

    /// Map schema applying one schema to every key
    #[inline]
    #[must_use]
    pub fn wildcard(schema: impl Into<Schema>) -> Self {
        Self::Map {
            fields: BTreeMap::new(),
            wildcard: Some(Box::new(schema.into())),
        }
    }

    /// Add a wildcard to a map schema
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_wildcard(self, schema: impl Into<Schema>) -> Self {
        match self {
            Self::Map { fields, .. } => Self::Map {
                fields,
                wildcard: Some(Box::new(schema.into())),
            },
            other => other,
        }
    }

    /// Parse the JSON schema notation
    ///
    /// - `null` infers
    /// - `"entity"`, `"counter"`, `"ratio"`, `"quantile"`, `"datetime"` are scalar rules
    /// - `"set"` is a set
    /// - `[s]` is a list of `s`
    /// - `{"$tuple": [s1, s2]}` is a tuple
    /// - any other object is a map, `"*"` being the wildcard
    ///
    /// # Errors
    /// Returns [`SchemaError`] for notation that does not map to a schema
    pub fn from_json(json: &serde_json::Value) -> Result<Self, SchemaError> {
        match json {
            serde_json::Value::Null => Ok(Self::Infer),
            serde_json::Value::String(s) if s == "set" => Ok(Self::Set),
            serde_json::Value::String(s) => s.parse().map(Self::Scalar),
            serde_json::Value::Array(items) => match items.as_slice() {
                [element] => Ok(Self::list(Self::from_json(element)?)),
                _ => Err(SchemaError::ListArity(items.len())),
            },
            serde_json::Value::Object(entries) => {
                if let Some(elements) = entries.get(TUPLE_KEY) {
                    let serde_json::Value::Array(elements) = elements else {
                        return Err(SchemaError::Malformed(format!(
                            "{TUPLE_KEY} expects an array"
                        )));
                    };
                    if entries.len() != 1 {
                        return Err(SchemaError::Malformed(format!(
                            "{TUPLE_KEY} cannot be mixed with other keys"
                        )));
                    }
                    return elements
                        .iter()
                        .map(Self::from_json)
                        .collect::<Result<Vec<_>, _>>()
                        .map(Self::Tuple);
                }

                let mut fields = BTreeMap::new();
                let mut wildcard = None;
                for (key, child) in entries {
                    let child = Self::from_json(child)?;
                    if key == WILDCARD_KEY {
                        wildcard = Some(Box::new(child));
                    } else {
                        fields.insert(key.clone(), child);
                    }
                }
                Ok(Self::Map { fields, wildcard })
            }
            other => Err(SchemaError::Malformed(format!(
                "unexpected schema node {other}"
            ))),
        }
    }
}

/// Errors parsing the JSON schema notation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Unknown scalar rule name
    #[error("unknown comparator type: {0}")]
    UnknownRule(String),

    /// List notation must hold exactly one element schema
    #[error("list schema must have exactly one element schema, found {0}")]
    ListArity(usize),

    /// Structurally invalid notation
    #[error("malformed schema: {0}")]
    Malformed(String),
}
