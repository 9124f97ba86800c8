//! Release-health backend interface
//!
//! Both the primary and the secondary implementation satisfy
//! [`ReleaseHealthBackend`]. [`crate::DuplexBackend`] implements it as well,
//! so callers cannot tell the proxy from a plain backend.

use crate::error::BackendError;
use crate::request::{
    ChangedAdoptionsRequest, CrashFreeBreakdownRequest, CrashFreeRatesRequest,
    HasHealthDataRequest, HealthOverviewRequest, OldestHealthDataRequest, ReleaseAdoptionRequest,
    ReleaseStatsRequest, ReleasesByStabilityRequest, ReleasesCountRequest,
    ReleasesHealthDataRequest, SessionsCountRequest, SessionsPerProjectRequest,
    SessionsQueryRequest, TimeBoundsRequest,
};
use crate::types::{
    CrashFreeBreakdown, CurrentAndPreviousCrashFreeRates, ProjectOrRelease, ProjectRelease,
    ProjectReleaseStats, ProjectWithCount, ReleaseHealthOverview, ReleaseName,
    ReleaseSessionsTimeBounds, ReleasesAdoption, SessionsQueryResult,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Release-health query surface
#[async_trait::async_trait]
pub trait ReleaseHealthBackend: Send + Sync + fmt::Debug {
    /// Crash-free rates per project for the current and previous window
    async fn get_current_and_previous_crash_free_rates(
        &self,
        request: &CrashFreeRatesRequest,
    ) -> Result<CurrentAndPreviousCrashFreeRates, BackendError>;

    /// Adoption per release over the last 24 hours
    async fn get_release_adoption(
        &self,
        request: &ReleaseAdoptionRequest,
    ) -> Result<ReleasesAdoption, BackendError>;

    /// Run an ad-hoc sessions query
    async fn run_sessions_query(
        &self,
        request: &SessionsQueryRequest,
    ) -> Result<SessionsQueryResult, BackendError>;

    /// First and last session of a release
    async fn get_release_sessions_time_bounds(
        &self,
        request: &TimeBoundsRequest,
    ) -> Result<ReleaseSessionsTimeBounds, BackendError>;

    /// Subset of the given projects or releases that have health data
    async fn check_has_health_data(
        &self,
        request: &HasHealthDataRequest,
    ) -> Result<BTreeSet<ProjectOrRelease>, BackendError>;

    /// Subset of the given release versions that have health data
    async fn check_releases_have_health_data(
        &self,
        request: &ReleasesHealthDataRequest,
    ) -> Result<BTreeSet<ReleaseName>, BackendError>;

    /// Health overview per release
    async fn get_release_health_data_overview(
        &self,
        request: &HealthOverviewRequest,
    ) -> Result<BTreeMap<ProjectRelease, ReleaseHealthOverview>, BackendError>;

    /// Crash-free figures of a release, one row per breakdown date
    async fn get_crash_free_breakdown(
        &self,
        request: &CrashFreeBreakdownRequest,
    ) -> Result<Vec<CrashFreeBreakdown>, BackendError>;

    /// Releases whose adoption changed recently
    async fn get_changed_project_release_model_adoptions(
        &self,
        request: &ChangedAdoptionsRequest,
    ) -> Result<Vec<ProjectRelease>, BackendError>;

    /// Timestamp of the oldest health data per release
    async fn get_oldest_health_data_for_releases(
        &self,
        request: &OldestHealthDataRequest,
    ) -> Result<BTreeMap<ProjectRelease, String>, BackendError>;

    /// Number of releases with data in the stats period
    async fn get_project_releases_count(
        &self,
        request: &ReleasesCountRequest,
    ) -> Result<u64, BackendError>;

    /// Bucketed stats and totals of a release
    async fn get_project_release_stats(
        &self,
        request: &ReleaseStatsRequest,
    ) -> Result<ProjectReleaseStats, BackendError>;

    /// Total sessions of a project
    async fn get_project_sessions_count(
        &self,
        request: &SessionsCountRequest,
    ) -> Result<u64, BackendError>;

    /// Sessions per project
    async fn get_num_sessions_per_project(
        &self,
        request: &SessionsPerProjectRequest,
    ) -> Result<Vec<ProjectWithCount>, BackendError>;

    /// Releases ordered by the requested stability scope
    async fn get_project_releases_by_stability(
        &self,
        request: &ReleasesByStabilityRequest,
    ) -> Result<Vec<ProjectRelease>, BackendError>;
}
