//! Backend requests
//!
//! One owned request struct per backend operation. The proxy hands the same
//! request to both backends and serializes it into the call context of every
//! report.

use crate::types::{
    EnvironmentName, OrganizationId, OverviewStat, ProjectId, ProjectOrRelease, ProjectRelease,
    QueryDefinition, ReleaseName,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Crash-free rates for two consecutive windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashFreeRatesRequest {
    pub project_ids: Vec<ProjectId>,
    pub current_start: DateTime<Utc>,
    pub current_end: DateTime<Utc>,
    pub previous_start: DateTime<Utc>,
    pub previous_end: DateTime<Utc>,
    pub rollup_secs: i64,
    pub org_id: Option<OrganizationId>,
}

/// Adoption of a set of releases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseAdoptionRequest {
    pub project_releases: Vec<ProjectRelease>,
    pub environments: Option<Vec<EnvironmentName>>,
    /// Reference instant, defaults to the backend's clock
    pub now: Option<DateTime<Utc>>,
    pub org_id: Option<OrganizationId>,
}

/// Ad-hoc sessions query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionsQueryRequest {
    pub org_id: OrganizationId,
    pub query: QueryDefinition,
    /// Tracing span name the backend should use
    pub span_op: String,
}

/// First and last session of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBoundsRequest {
    pub project_id: ProjectId,
    pub release: ReleaseName,
    pub org_id: OrganizationId,
    pub environments: Option<Vec<EnvironmentName>>,
}

/// Which of the given projects or releases have any health data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasHealthDataRequest {
    pub projects: Vec<ProjectOrRelease>,
}

/// Which of the given release versions have health data in a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleasesHealthDataRequest {
    pub org_id: OrganizationId,
    pub project_ids: Vec<ProjectId>,
    pub release_versions: Vec<ReleaseName>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Health overview of a set of releases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthOverviewRequest {
    pub project_releases: Vec<ProjectRelease>,
    pub environments: Option<Vec<EnvironmentName>>,
    pub summary_stats_period: Option<String>,
    pub health_stats_period: Option<String>,
    pub stat: Option<OverviewStat>,
}

/// Daily crash-free figures of a release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashFreeBreakdownRequest {
    pub project_id: ProjectId,
    pub release: ReleaseName,
    pub start: DateTime<Utc>,
    pub environments: Option<Vec<EnvironmentName>>,
}

/// Releases whose adoption state changed recently
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedAdoptionsRequest {
    pub project_ids: Vec<ProjectId>,
}

/// Oldest health data per release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldestHealthDataRequest {
    pub project_releases: Vec<ProjectRelease>,
}

/// Number of releases matching a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasesCountRequest {
    pub org_id: OrganizationId,
    pub project_ids: Vec<ProjectId>,
    /// Sort scope, e.g. `sessions` or `crash_free_sessions_24h`
    pub scope: String,
    pub stats_period: Option<String>,
    pub environments: Option<Vec<EnvironmentName>>,
}

/// Bucketed stats of one release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseStatsRequest {
    pub project_id: ProjectId,
    pub release: ReleaseName,
    pub stat: OverviewStat,
    pub rollup_secs: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub environments: Option<Vec<EnvironmentName>>,
}

/// Total sessions of a project in a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionsCountRequest {
    pub project_id: ProjectId,
    pub rollup_secs: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub environment_id: Option<u64>,
}

/// Sessions per project in a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionsPerProjectRequest {
    pub project_ids: Vec<ProjectId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub environment_ids: Option<Vec<u64>>,
    pub rollup_secs: Option<i64>,
}

/// Releases ordered by a stability scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasesByStabilityRequest {
    pub project_ids: Vec<ProjectId>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub scope: String,
    pub stats_period: Option<String>,
    pub environments: Option<Vec<EnvironmentName>>,
}
