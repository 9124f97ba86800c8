//! Duplex Compare
//!
//! Schema-driven structural comparison of two result trees with
//! type-appropriate tolerance rules.
//!
//! # Core Concepts
//!
//! - [`Value`]: Owned snapshot of a backend result
//! - [`Schema`]: Recursive description of how to compare two values
//! - [`ComparatorType`]: Scalar tolerance strategy (entity, counter, ratio, quantile, datetime)
//! - [`Discrepancy`]: One mismatch found at a path
//!
//! # Example
//!
//! ```rust
//! use duplex_compare::{compare_values, ComparatorType, Schema, Value};
//!
//! let schema = Schema::fields([("rate", ComparatorType::Ratio)]);
//! let primary = Value::object([("rate", Value::Float(0.50))]);
//! let secondary = Value::object([("rate", Value::Float(0.51))]);
//!
//! let discrepancies = compare_values(&primary, &secondary, &schema, 3600);
//! assert_eq!(discrepancies.len(), 1);
//! assert_eq!(discrepancies[0].path, "rate");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod discrepancy;
mod engine;
pub mod rules;
mod schema;
mod value;

// Re-exports
pub use discrepancy::{index_path, key_path, Discrepancy, DiscrepancyKind};
pub use engine::{compare, compare_values};
pub use rules::parse_datetime;
pub use schema::{ComparatorType, Schema, SchemaError, TUPLE_KEY, WILDCARD_KEY};
pub use value::{ToValue, Value};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
