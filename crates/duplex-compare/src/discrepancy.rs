//! Discrepancy records and path construction

use crate::value::Value;
use serde::Serialize;
use std::fmt;

/// Classification of a detected mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Value present on exactly one side
    Unmatched,
    /// Values of incompatible shapes
    TypeMismatch,
    /// Values outside the rule's tolerance
    ValueMismatch,
    /// Sequences of different lengths
    LengthMismatch,
    /// Mappings with different key counts
    KeyCountMismatch,
    /// Value violating a rule precondition (negative counts or ratios)
    InvalidValue,
    /// Date string that could not be parsed
    Unparseable,
    /// Schema or type the engine has no comparator for
    Unsupported,
}

/// One mismatch found at a specific path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    /// Dotted/bracketed path, empty at the root
    pub path: String,
    /// Mismatch classification
    pub kind: DiscrepancyKind,
    /// Human-readable description
    pub message: String,
}

impl Discrepancy {
    /// Create new discrepancy
    #[inline]
    #[must_use]
    pub fn new(path: &str, kind: DiscrepancyKind, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Path as printed in messages
pub(crate) fn shown(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

/// Path of a sequence element
#[inline]
#[must_use]
pub fn index_path(path: &str, idx: usize) -> String {
    format!("{path}[{idx}]")
}

/// Path of a mapping entry
///
/// String keys are appended dotted, any other key is bracketed.
#[must_use]
pub fn key_path(path: &str, key: &Value) -> String {
    match key {
        Value::Str(name) if path.is_empty() => name.clone(),
        Value::Str(name) => format!("{path}.{name}"),
        other => format!("{path}[{other}]"),
    }
}
