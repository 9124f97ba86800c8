//! Scalar tolerance rules
//!
//! Each rule returns at most one [`Discrepancy`]; `None` means the values are
//! close enough. All rules share the absence check: both sides absent is a
//! match, exactly one side absent is reported.

use crate::discrepancy::{shown, Discrepancy, DiscrepancyKind};
use crate::schema::ComparatorType;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Counters at or below this value use absolute slack
const SMALL_COUNT: f64 = 10.0;
/// Allowed absolute difference when one counter is small and the other is not
const MIXED_COUNT_SLACK: f64 = 4.0;
/// Allowed absolute difference when both counters are small
const SMALL_COUNT_SLACK: f64 = 3.0;
/// Allowed relative difference for large counters
const COUNTER_TOLERANCE: f64 = 0.05;
/// Allowed relative difference for ratios and quantiles
const RATIO_TOLERANCE: f64 = 0.01;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

fn check_presence(primary: &Value, secondary: &Value, path: &str) -> Option<Option<Discrepancy>> {
    match (primary.is_null(), secondary.is_null()) {
        (true, true) => Some(None),
        (true, false) => Some(Some(Discrepancy::new(
            path,
            DiscrepancyKind::Unmatched,
            format!("field {} only present in secondary implementation", shown(path)),
        ))),
        (false, true) => Some(Some(Discrepancy::new(
            path,
            DiscrepancyKind::Unmatched,
            format!("field {} missing from secondary implementation", shown(path)),
        ))),
        (false, false) => None,
    }
}

fn different_values(primary: &Value, secondary: &Value, path: &str) -> Discrepancy {
    Discrepancy::new(
        path,
        DiscrepancyKind::ValueMismatch,
        format!(
            "fields with different values at {} primary={primary}, secondary={secondary}",
            shown(path)
        ),
    )
}

fn numeric_pair(primary: &Value, secondary: &Value, path: &str) -> Result<(f64, f64), Discrepancy> {
    match (primary.as_f64(), secondary.as_f64()) {
        (Some(p), Some(s)) => Ok((p, s)),
        _ => Err(Discrepancy::new(
            path,
            DiscrepancyKind::TypeMismatch,
            format!(
                "field {} expected numeric values primary={primary} ({}), secondary={secondary} ({})",
                shown(path),
                primary.kind_name(),
                secondary.kind_name()
            ),
        )),
    }
}

fn check_non_negative(
    primary: &Value,
    secondary: &Value,
    p: f64,
    s: f64,
    path: &str,
) -> Option<Discrepancy> {
    if s < 0.0 {
        return Some(Discrepancy::new(
            path,
            DiscrepancyKind::InvalidValue,
            format!(
                "invalid field {} value={secondary} from secondary, only positive values are expected",
                shown(path)
            ),
        ));
    }
    if p < 0.0 {
        return Some(Discrepancy::new(
            path,
            DiscrepancyKind::InvalidValue,
            format!(
                "invalid field {} value={primary} from primary, only positive values are expected",
                shown(path)
            ),
        ));
    }
    None
}

// Integers and floats holding the same number are the same entity.
fn entities_equal(primary: &Value, secondary: &Value) -> bool {
    match (primary, secondary) {
        (Value::Float(_), Value::Int(_) | Value::UInt(_))
        | (Value::Int(_) | Value::UInt(_), Value::Float(_)) => {
            primary.as_f64() == secondary.as_f64()
        }
        _ => primary == secondary,
    }
}

/// Exact equality
#[must_use]
pub fn compare_entities(primary: &Value, secondary: &Value, path: &str) -> Option<Discrepancy> {
    if let Some(done) = check_presence(primary, secondary, path) {
        return done;
    }
    if !entities_equal(primary, secondary) {
        return Some(Discrepancy::new(
            path,
            DiscrepancyKind::ValueMismatch,
            format!(
                "field {} contains different data primary={primary}, secondary={secondary}",
                shown(path)
            ),
        ));
    }
    None
}

/// Counts: absolute slack for small numbers, 5% of the secondary otherwise
#[must_use]
pub fn compare_counters(primary: &Value, secondary: &Value, path: &str) -> Option<Discrepancy> {
    if let Some(done) = check_presence(primary, secondary, path) {
        return done;
    }
    let (p, s) = match numeric_pair(primary, secondary, path) {
        Ok(pair) => pair,
        Err(d) => return Some(d),
    };
    if let Some(d) = check_non_negative(primary, secondary, p, s, path) {
        return Some(d);
    }

    let diff = (p - s).abs();
    let mismatch = if (p <= SMALL_COUNT) != (s <= SMALL_COUNT) {
        diff > MIXED_COUNT_SLACK
    } else if s <= SMALL_COUNT {
        diff > SMALL_COUNT_SLACK
    } else {
        diff / s > COUNTER_TOLERANCE
    };

    mismatch.then(|| different_values(primary, secondary, path))
}

/// Ratios: 1% of the larger value
#[must_use]
pub fn compare_ratios(primary: &Value, secondary: &Value, path: &str) -> Option<Discrepancy> {
    if let Some(done) = check_presence(primary, secondary, path) {
        return done;
    }
    let (p, s) = match numeric_pair(primary, secondary, path) {
        Ok(pair) => pair,
        Err(d) => return Some(d),
    };
    if let Some(d) = check_non_negative(primary, secondary, p, s, path) {
        return Some(d);
    }
    if p == 0.0 && s == 0.0 {
        return None;
    }

    ((p - s).abs() / p.max(s) > RATIO_TOLERANCE).then(|| different_values(primary, secondary, path))
}

/// Quantiles share the ratio tolerance
#[inline]
#[must_use]
pub fn compare_quantiles(primary: &Value, secondary: &Value, path: &str) -> Option<Discrepancy> {
    compare_ratios(primary, secondary, path)
}

/// Parse an ISO-8601 date string
///
/// Strings without an offset are taken as UTC; a bare date is midnight.
#[must_use]
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Instants: equal within the rollup
#[must_use]
pub fn compare_datetime(
    primary: &Value,
    secondary: &Value,
    rollup_secs: i64,
    path: &str,
) -> Option<Discrepancy> {
    if let Some(done) = check_presence(primary, secondary, path) {
        return done;
    }

    let (p, s) = match (primary, secondary) {
        (Value::DateTime(p), Value::DateTime(s)) => (*p, *s),
        (Value::Str(p_raw), Value::Str(s_raw)) => {
            match (parse_datetime(p_raw), parse_datetime(s_raw)) {
                (Some(p), Some(s)) => (p, s),
                _ => {
                    return Some(Discrepancy::new(
                        path,
                        DiscrepancyKind::Unparseable,
                        format!(
                            "field {} could not parse dates primary={primary}, secondary={secondary}",
                            shown(path)
                        ),
                    ))
                }
            }
        }
        (Value::DateTime(_) | Value::Str(_), Value::DateTime(_) | Value::Str(_)) => {
            return Some(Discrepancy::new(
                path,
                DiscrepancyKind::TypeMismatch,
                format!(
                    "field {} inconsistent types primary={}, secondary={}",
                    shown(path),
                    primary.kind_name(),
                    secondary.kind_name()
                ),
            ))
        }
        _ => {
            return Some(Discrepancy::new(
                path,
                DiscrepancyKind::TypeMismatch,
                format!(
                    "field {} expected datetime values primary={primary} ({}), secondary={secondary} ({})",
                    shown(path),
                    primary.kind_name(),
                    secondary.kind_name()
                ),
            ))
        }
    };

    let skew_ms = (p - s).num_milliseconds().abs();
    if skew_ms > rollup_secs.saturating_mul(1000) {
        return Some(Discrepancy::new(
            path,
            DiscrepancyKind::ValueMismatch,
            format!(
                "field {} failed to match datetimes primary={primary}, secondary={secondary}",
                shown(path)
            ),
        ));
    }
    None
}

/// Compare a scalar leaf
///
/// Without an explicit rule the primary value picks one: strings and
/// integers are entities, floats are ratios, instants are datetimes.
#[must_use]
pub fn compare_scalar(
    primary: &Value,
    secondary: &Value,
    rollup_secs: i64,
    path: &str,
    rule: Option<ComparatorType>,
) -> Option<Discrepancy> {
    let rule = match rule {
        Some(rule) => rule,
        None => match primary {
            Value::Str(_) | Value::Int(_) | Value::UInt(_) => ComparatorType::Entity,
            Value::Float(_) => ComparatorType::Ratio,
            Value::DateTime(_) => ComparatorType::DateTime,
            other => {
                return Some(Discrepancy::new(
                    path,
                    DiscrepancyKind::Unsupported,
                    format!(
                        "unsupported scalar type {} at path {}",
                        other.kind_name(),
                        shown(path)
                    ),
                ))
            }
        },
    };

    match rule {
        ComparatorType::Entity => compare_entities(primary, secondary, path),
        ComparatorType::Counter => compare_counters(primary, secondary, path),
        ComparatorType::Ratio => compare_ratios(primary, secondary, path),
        ComparatorType::Quantile => compare_quantiles(primary, secondary, path),
        ComparatorType::DateTime => compare_datetime(primary, secondary, rollup_secs, path),
    }
}
