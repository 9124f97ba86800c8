//! Dynamic value tree
//!
//! Provides [`Value`], the owned snapshot every backend result is converted
//! into before comparison, and the [`ToValue`] conversion trait.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Owned, dynamically shaped value
///
/// Values are totally ordered (floats use the IEEE total order), so they can
/// key maps and populate sets. Equality is defined through that order.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer beyond the signed range
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// String
    Str(String),
    /// Absolute instant
    DateTime(DateTime<Utc>),
    /// Fixed-arity sequence
    Tuple(Vec<Value>),
    /// Variable-length sequence
    List(Vec<Value>),
    /// Unordered collection
    Set(BTreeSet<Value>),
    /// Keyed mapping
    Map(BTreeMap<Value, Value>),
}

impl Value {
    /// Build a string-keyed mapping
    #[must_use]
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Self::Str(k.into()), v))
                .collect(),
        )
    }

    /// Short name of the variant, used in type mismatch messages
    #[inline]
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::UInt(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::DateTime(_) => "datetime",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    /// Check for the absent value
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of integer and Float values
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::UInt(u) => Some(*u as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Elements of a Tuple or List
    #[inline]
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Tuple(items) | Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Entries of a Map
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<Value, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a string key in a Map
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()
            .and_then(|map| map.get(&Self::Str(key.to_string())))
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::UInt(_) => 2,
            Self::Float(_) => 3,
            Self::Str(_) => 4,
            Self::DateTime(_) => 5,
            Self::Tuple(_) => 6,
            Self::List(_) => 7,
            Self::Set(_) => 8,
            Self::Map(_) => 9,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::UInt(a), Self::UInt(b)) => a.cmp(b),
            (Self::Int(a), Self::UInt(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (Self::UInt(a), Self::Int(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            (Self::Tuple(a), Self::Tuple(b)) | (Self::List(a), Self::List(b)) => a.cmp(b),
            (Self::Set(a), Self::Set(b)) => a.cmp(b),
            (Self::Map(a), Self::Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

fn write_joined<'a, I>(f: &mut fmt::Formatter<'_>, items: I) -> fmt::Result
where
    I: IntoIterator<Item = &'a Value>,
{
    for (idx, item) in items.into_iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => f.write_str(s),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                f.write_str(")")
            }
            Self::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Self::Set(items) => {
                f.write_str("{")?;
                write_joined(f, items)?;
                f.write_str("}")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (idx, (k, v)) in map.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(u)) => Self::UInt(u),
                (None, None) => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(fields) => Self::object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v))),
            ),
        }
    }
}

/// Conversion into an owned [`Value`] snapshot
///
/// The produced value shares nothing with `self`, so it doubles as the deep
/// copy taken before a shadow call.
pub trait ToValue {
    /// Snapshot `self` as a [`Value`]
    fn to_value(&self) -> Value;
}

impl ToValue for Value {
    #[inline]
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    #[inline]
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue + ?Sized> ToValue for Box<T> {
    #[inline]
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl ToValue for bool {
    #[inline]
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! int_to_value {
    ($($t:ty),*) => {
        $(
            impl ToValue for $t {
                #[inline]
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }
        )*
    };
}

int_to_value!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for u64 {
    #[inline]
    fn to_value(&self) -> Value {
        i64::try_from(*self).map_or(Value::UInt(*self), Value::Int)
    }
}

impl ToValue for usize {
    #[inline]
    fn to_value(&self) -> Value {
        // usize is at most 64 bits on supported targets
        u64::try_from(*self).map_or(Value::Null, |u| u.to_value())
    }
}

impl ToValue for f32 {
    #[inline]
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl ToValue for f64 {
    #[inline]
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToValue for str {
    #[inline]
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl ToValue for String {
    #[inline]
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl ToValue for DateTime<Utc> {
    #[inline]
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: ToValue> ToValue for BTreeSet<T> {
    fn to_value(&self) -> Value {
        Value::Set(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue, S> ToValue for HashSet<T, S> {
    fn to_value(&self) -> Value {
        Value::Set(self.iter().map(ToValue::to_value).collect())
    }
}

impl<K: ToValue, V: ToValue> ToValue for BTreeMap<K, V> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.to_value(), v.to_value()))
                .collect(),
        )
    }
}

impl<K: ToValue, V: ToValue, S> ToValue for HashMap<K, V, S> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.to_value(), v.to_value()))
                .collect(),
        )
    }
}

impl<A: ToValue, B: ToValue> ToValue for (A, B) {
    fn to_value(&self) -> Value {
        Value::Tuple(vec![self.0.to_value(), self.1.to_value()])
    }
}

impl<A: ToValue, B: ToValue, C: ToValue> ToValue for (A, B, C) {
    fn to_value(&self) -> Value {
        Value::Tuple(vec![self.0.to_value(), self.1.to_value(), self.2.to_value()])
    }
}
