//! Core types for Duplex
//!
//! Defines the release-health vocabulary shared by both backends:
//! - Identifiers (projects, organizations, releases)
//! - Operation results
//! - Stats periods
//!
//! Every result type implements [`ToValue`], which is how the proxy takes
//! its snapshot of the primary result.

use crate::error::StatsPeriodError;
use chrono::{DateTime, Duration, Utc};
use duplex_compare::{ToValue, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Project identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToValue for ProjectId {
    #[inline]
    fn to_value(&self) -> Value {
        self.0.to_value()
    }
}

/// Organization identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub u64);

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Release version string
pub type ReleaseName = String;

/// Environment name
pub type EnvironmentName = String;

/// A release within a project
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectRelease {
    /// Owning project
    pub project_id: ProjectId,
    /// Release version
    pub release: ReleaseName,
}

impl ProjectRelease {
    /// Create new project release
    #[inline]
    #[must_use]
    pub fn new(project_id: u64, release: impl Into<ReleaseName>) -> Self {
        Self {
            project_id: ProjectId(project_id),
            release: release.into(),
        }
    }
}

impl ToValue for ProjectRelease {
    fn to_value(&self) -> Value {
        Value::Tuple(vec![self.project_id.to_value(), self.release.to_value()])
    }
}

/// Either a whole project or one of its releases
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProjectOrRelease {
    /// A project
    Project(ProjectId),
    /// A release of a project
    Release(ProjectRelease),
}

impl ToValue for ProjectOrRelease {
    fn to_value(&self) -> Value {
        match self {
            Self::Project(id) => id.to_value(),
            Self::Release(release) => release.to_value(),
        }
    }
}

/// Statistic reported by release stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverviewStat {
    /// Distinct users
    Users,
    /// Sessions
    Sessions,
}

impl OverviewStat {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Sessions => "sessions",
        }
    }
}

/// Crash-free rates for a project in two consecutive windows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashFreeRates {
    /// Rate in the current window
    pub current_crash_free_rate: Option<f64>,
    /// Rate in the previous window
    pub previous_crash_free_rate: Option<f64>,
}

impl ToValue for CrashFreeRates {
    fn to_value(&self) -> Value {
        Value::object([
            ("currentCrashFreeRate", self.current_crash_free_rate.to_value()),
            ("previousCrashFreeRate", self.previous_crash_free_rate.to_value()),
        ])
    }
}

/// Crash-free rates per project
pub type CurrentAndPreviousCrashFreeRates = BTreeMap<ProjectId, CrashFreeRates>;

/// Adoption figures for one release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseAdoption {
    /// Share of users on the release
    pub adoption: Option<f64>,
    /// Share of sessions on the release
    pub sessions_adoption: Option<f64>,
    /// Release users over 24h
    pub users_24h: Option<u64>,
    /// Project users over 24h
    pub project_users_24h: Option<u64>,
    /// Release sessions over 24h
    pub sessions_24h: Option<u64>,
    /// Project sessions over 24h
    pub project_sessions_24h: Option<u64>,
}

impl ToValue for ReleaseAdoption {
    fn to_value(&self) -> Value {
        Value::object([
            ("adoption", self.adoption.to_value()),
            ("sessions_adoption", self.sessions_adoption.to_value()),
            ("users_24h", self.users_24h.to_value()),
            ("project_users_24h", self.project_users_24h.to_value()),
            ("sessions_24h", self.sessions_24h.to_value()),
            ("project_sessions_24h", self.project_sessions_24h.to_value()),
        ])
    }
}

/// Adoption per release
pub type ReleasesAdoption = BTreeMap<ProjectRelease, ReleaseAdoption>;

/// Ad-hoc sessions query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    /// Filter expression
    pub query: String,
    /// Requested fields, e.g. `sum(session)`
    pub fields: Vec<String>,
    /// Group-by columns
    pub group_by: Vec<String>,
    /// Window start
    pub start: DateTime<Utc>,
    /// Window end
    pub end: DateTime<Utc>,
    /// Bucket size in seconds
    pub rollup_secs: i64,
}

/// One group of a sessions query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionsQueryGroup {
    /// Group-by column values
    pub by: BTreeMap<String, String>,
    /// Totals per field
    pub totals: BTreeMap<String, f64>,
    /// Time series per field, aligned with the result intervals
    pub series: BTreeMap<String, Vec<f64>>,
}

impl ToValue for SessionsQueryGroup {
    fn to_value(&self) -> Value {
        Value::object([
            ("by", self.by.to_value()),
            ("totals", self.totals.to_value()),
            ("series", self.series.to_value()),
        ])
    }
}

/// Result of a sessions query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionsQueryResult {
    /// Effective window start
    pub start: DateTime<Utc>,
    /// Effective window end
    pub end: DateTime<Utc>,
    /// Bucket starts
    pub intervals: Vec<DateTime<Utc>>,
    /// Result groups
    pub groups: Vec<SessionsQueryGroup>,
    /// Echo of the filter expression
    pub query: String,
}

impl ToValue for SessionsQueryResult {
    fn to_value(&self) -> Value {
        Value::object([
            ("start", self.start.to_value()),
            ("end", self.end.to_value()),
            ("intervals", self.intervals.to_value()),
            ("groups", self.groups.to_value()),
            ("query", self.query.to_value()),
        ])
    }
}

/// First and last session seen for a release, as ISO-8601 strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSessionsTimeBounds {
    /// Oldest session
    pub sessions_lower_bound: Option<String>,
    /// Newest session
    pub sessions_upper_bound: Option<String>,
}

impl ToValue for ReleaseSessionsTimeBounds {
    fn to_value(&self) -> Value {
        Value::object([
            ("sessions_lower_bound", self.sessions_lower_bound.to_value()),
            ("sessions_upper_bound", self.sessions_upper_bound.to_value()),
        ])
    }
}

/// Health overview of one release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseHealthOverview {
    pub adoption: Option<f64>,
    pub sessions_adoption: Option<f64>,
    pub total_users_24h: Option<u64>,
    pub total_project_users_24h: Option<u64>,
    pub total_sessions_24h: Option<u64>,
    pub total_project_sessions_24h: Option<u64>,
    pub total_users: u64,
    pub total_sessions: u64,
    pub crash_free_users: Option<f64>,
    pub crash_free_sessions: Option<f64>,
    pub sessions_crashed: u64,
    pub sessions_errored: u64,
    pub has_health_data: bool,
    pub duration_p50: Option<f64>,
    pub duration_p90: Option<f64>,
    /// Bucketed `(timestamp, count)` series per stats period
    pub stats: BTreeMap<String, Vec<(i64, u64)>>,
}

impl ToValue for ReleaseHealthOverview {
    fn to_value(&self) -> Value {
        Value::object([
            ("adoption", self.adoption.to_value()),
            ("sessions_adoption", self.sessions_adoption.to_value()),
            ("total_users_24h", self.total_users_24h.to_value()),
            ("total_project_users_24h", self.total_project_users_24h.to_value()),
            ("total_sessions_24h", self.total_sessions_24h.to_value()),
            ("total_project_sessions_24h", self.total_project_sessions_24h.to_value()),
            ("total_users", self.total_users.to_value()),
            ("total_sessions", self.total_sessions.to_value()),
            ("crash_free_users", self.crash_free_users.to_value()),
            ("crash_free_sessions", self.crash_free_sessions.to_value()),
            ("sessions_crashed", self.sessions_crashed.to_value()),
            ("sessions_errored", self.sessions_errored.to_value()),
            ("has_health_data", self.has_health_data.to_value()),
            ("duration_p50", self.duration_p50.to_value()),
            ("duration_p90", self.duration_p90.to_value()),
            ("stats", self.stats.to_value()),
        ])
    }
}

/// Crash-free figures for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashFreeBreakdown {
    /// Breakdown cut-off
    pub date: DateTime<Utc>,
    pub total_users: u64,
    pub crash_free_users: Option<f64>,
    pub total_sessions: u64,
    pub crash_free_sessions: Option<f64>,
}

impl ToValue for CrashFreeBreakdown {
    fn to_value(&self) -> Value {
        Value::object([
            ("date", self.date.to_value()),
            ("total_users", self.total_users.to_value()),
            ("crash_free_users", self.crash_free_users.to_value()),
            ("total_sessions", self.total_sessions.to_value()),
            ("crash_free_sessions", self.crash_free_sessions.to_value()),
        ])
    }
}

/// One bucket of release stats
///
/// Counts are keyed by series name (`users`, `users_crashed`, `sessions_errored`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsBucket {
    pub counts: BTreeMap<String, u64>,
    pub duration_p50: Option<f64>,
    pub duration_p90: Option<f64>,
}

impl ToValue for StatsBucket {
    fn to_value(&self) -> Value {
        let mut entries: Vec<(String, Value)> = self
            .counts
            .iter()
            .map(|(name, count)| (name.clone(), count.to_value()))
            .collect();
        entries.push(("duration_p50".to_string(), self.duration_p50.to_value()));
        entries.push(("duration_p90".to_string(), self.duration_p90.to_value()));
        Value::object(entries)
    }
}

/// Release stats: a bucketed series plus totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectReleaseStats {
    /// `(bucket timestamp, bucket)` pairs
    pub series: Vec<(i64, StatsBucket)>,
    /// Totals over the whole window
    pub totals: BTreeMap<String, u64>,
}

impl ToValue for ProjectReleaseStats {
    fn to_value(&self) -> Value {
        Value::Tuple(vec![self.series.to_value(), self.totals.to_value()])
    }
}

/// Sessions counted for one project
pub type ProjectWithCount = (ProjectId, u64);

const HOUR: i64 = 3600;
const DAY: i64 = 86_400;

/// Named stats window, e.g. `24h` or `14d`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsPeriod {
    name: &'static str,
    rollup_secs: i64,
    buckets: i64,
}

impl StatsPeriod {
    const TABLE: [StatsPeriod; 9] = [
        StatsPeriod::new("1h", HOUR, 1),
        StatsPeriod::new("24h", HOUR, 24),
        StatsPeriod::new("1d", HOUR, 24),
        StatsPeriod::new("48h", HOUR, 48),
        StatsPeriod::new("2d", HOUR, 48),
        StatsPeriod::new("7d", DAY, 7),
        StatsPeriod::new("14d", DAY, 14),
        StatsPeriod::new("30d", DAY, 30),
        StatsPeriod::new("90d", DAY, 90),
    ];

    const fn new(name: &'static str, rollup_secs: i64, buckets: i64) -> Self {
        Self {
            name,
            rollup_secs,
            buckets,
        }
    }

    /// Resolve the period used by scoped release listings
    ///
    /// No period means `24h`, and scopes ending in `_24h` always use `24h`.
    ///
    /// # Errors
    /// Returns [`StatsPeriodError`] for unknown period names
    pub fn for_scope(stats_period: Option<&str>, scope: &str) -> Result<Self, StatsPeriodError> {
        let name = if scope.ends_with("_24h") {
            "24h"
        } else {
            stats_period.unwrap_or("24h")
        };
        name.parse()
    }

    /// Period name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Bucket size in seconds
    #[inline]
    #[must_use]
    pub fn rollup_secs(&self) -> i64 {
        self.rollup_secs
    }

    /// Number of buckets
    #[inline]
    #[must_use]
    pub fn buckets(&self) -> i64 {
        self.buckets
    }

    /// Start of the window ending at `now`
    #[inline]
    #[must_use]
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::seconds(self.rollup_secs * self.buckets)
    }
}

impl FromStr for StatsPeriod {
    type Err = StatsPeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::TABLE
            .iter()
            .find(|period| period.name == s)
            .copied()
            .ok_or_else(|| StatsPeriodError(s.to_string()))
    }
}

impl fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
