//! Testing utilities for the Duplex workspace
//!
//! Shared spy backends, fixtures, and proxy setup.

#![allow(missing_docs)]

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use duplex_core::prelude::*;
use duplex_core::{
    CrashFreeBreakdown, CurrentAndPreviousCrashFreeRates, ProjectOrRelease, ProjectReleaseStats,
    ProjectWithCount, ReleaseHealthOverview, ReleaseName, ReleaseSessionsTimeBounds,
    ReleasesAdoption, SessionsQueryResult,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Canned answers, one per operation
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    pub crash_free_rates: CurrentAndPreviousCrashFreeRates,
    pub adoption: ReleasesAdoption,
    pub sessions_query: Option<SessionsQueryResult>,
    pub time_bounds: ReleaseSessionsTimeBounds,
    pub has_health_data: BTreeSet<ProjectOrRelease>,
    pub releases_with_data: BTreeSet<ReleaseName>,
    pub overview: BTreeMap<ProjectRelease, ReleaseHealthOverview>,
    pub crash_free_breakdown: Vec<CrashFreeBreakdown>,
    pub changed_adoptions: Vec<ProjectRelease>,
    pub oldest_health_data: BTreeMap<ProjectRelease, String>,
    pub releases_count: u64,
    pub release_stats: ProjectReleaseStats,
    pub sessions_count: u64,
    pub sessions_per_project: Vec<ProjectWithCount>,
    pub releases_by_stability: Vec<ProjectRelease>,
}

/// What a scripted backend does when called
#[derive(Debug, Clone, Default)]
pub enum Behavior {
    /// Answer from fixtures
    #[default]
    Answer,
    /// Return this error
    Fail(BackendError),
    /// Panic with this message
    Panic(String),
}

/// Spy backend answering from fixtures and counting calls per operation
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    fixtures: Fixtures,
    behavior: Behavior,
    calls: DashMap<&'static str, usize>,
}

impl ScriptedBackend {
    /// Backend answering from `fixtures`
    #[must_use]
    pub fn new(fixtures: Fixtures) -> Self {
        Self {
            fixtures,
            ..Self::default()
        }
    }

    /// Backend failing every call with `error`
    #[must_use]
    pub fn failing(error: BackendError) -> Self {
        Self {
            behavior: Behavior::Fail(error),
            ..Self::default()
        }
    }

    /// Backend panicking on every call
    #[must_use]
    pub fn panicking(message: &str) -> Self {
        Self {
            behavior: Behavior::Panic(message.to_string()),
            ..Self::default()
        }
    }

    /// Calls made to `operation`
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.calls.get(operation).map_or(0, |count| *count)
    }

    /// Calls made to any operation
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }

    fn enter(&self, operation: &'static str) -> Result<&Fixtures, BackendError> {
        *self.calls.entry(operation).or_insert(0) += 1;
        match &self.behavior {
            Behavior::Answer => Ok(&self.fixtures),
            Behavior::Fail(error) => Err(error.clone()),
            Behavior::Panic(message) => panic!("{message}"),
        }
    }
}

#[async_trait::async_trait]
impl ReleaseHealthBackend for ScriptedBackend {
    async fn get_current_and_previous_crash_free_rates(
        &self,
        _request: &CrashFreeRatesRequest,
    ) -> Result<CurrentAndPreviousCrashFreeRates, BackendError> {
        Ok(self
            .enter("get_current_and_previous_crash_free_rates")?
            .crash_free_rates
            .clone())
    }

    async fn get_release_adoption(
        &self,
        _request: &ReleaseAdoptionRequest,
    ) -> Result<ReleasesAdoption, BackendError> {
        Ok(self.enter("get_release_adoption")?.adoption.clone())
    }

    async fn run_sessions_query(
        &self,
        request: &SessionsQueryRequest,
    ) -> Result<SessionsQueryResult, BackendError> {
        self.enter("run_sessions_query")?
            .sessions_query
            .clone()
            .ok_or_else(|| BackendError::InvalidQuery(request.query.query.clone()))
    }

    async fn get_release_sessions_time_bounds(
        &self,
        _request: &TimeBoundsRequest,
    ) -> Result<ReleaseSessionsTimeBounds, BackendError> {
        Ok(self
            .enter("get_release_sessions_time_bounds")?
            .time_bounds
            .clone())
    }

    async fn check_has_health_data(
        &self,
        _request: &HasHealthDataRequest,
    ) -> Result<BTreeSet<ProjectOrRelease>, BackendError> {
        Ok(self.enter("check_has_health_data")?.has_health_data.clone())
    }

    async fn check_releases_have_health_data(
        &self,
        _request: &ReleasesHealthDataRequest,
    ) -> Result<BTreeSet<ReleaseName>, BackendError> {
        Ok(self
            .enter("check_releases_have_health_data")?
            .releases_with_data
            .clone())
    }

    async fn get_release_health_data_overview(
        &self,
        _request: &HealthOverviewRequest,
    ) -> Result<BTreeMap<ProjectRelease, ReleaseHealthOverview>, BackendError> {
        Ok(self
            .enter("get_release_health_data_overview")?
            .overview
            .clone())
    }

    async fn get_crash_free_breakdown(
        &self,
        _request: &CrashFreeBreakdownRequest,
    ) -> Result<Vec<CrashFreeBreakdown>, BackendError> {
        Ok(self
            .enter("get_crash_free_breakdown")?
            .crash_free_breakdown
            .clone())
    }

    async fn get_changed_project_release_model_adoptions(
        &self,
        _request: &ChangedAdoptionsRequest,
    ) -> Result<Vec<ProjectRelease>, BackendError> {
        Ok(self
            .enter("get_changed_project_release_model_adoptions")?
            .changed_adoptions
            .clone())
    }

    async fn get_oldest_health_data_for_releases(
        &self,
        _request: &OldestHealthDataRequest,
    ) -> Result<BTreeMap<ProjectRelease, String>, BackendError> {
        Ok(self
            .enter("get_oldest_health_data_for_releases")?
            .oldest_health_data
            .clone())
    }

    async fn get_project_releases_count(
        &self,
        _request: &ReleasesCountRequest,
    ) -> Result<u64, BackendError> {
        Ok(self.enter("get_project_releases_count")?.releases_count)
    }

    async fn get_project_release_stats(
        &self,
        _request: &ReleaseStatsRequest,
    ) -> Result<ProjectReleaseStats, BackendError> {
        Ok(self.enter("get_project_release_stats")?.release_stats.clone())
    }

    async fn get_project_sessions_count(
        &self,
        _request: &SessionsCountRequest,
    ) -> Result<u64, BackendError> {
        Ok(self.enter("get_project_sessions_count")?.sessions_count)
    }

    async fn get_num_sessions_per_project(
        &self,
        _request: &SessionsPerProjectRequest,
    ) -> Result<Vec<ProjectWithCount>, BackendError> {
        Ok(self
            .enter("get_num_sessions_per_project")?
            .sessions_per_project
            .clone())
    }

    async fn get_project_releases_by_stability(
        &self,
        _request: &ReleasesByStabilityRequest,
    ) -> Result<Vec<ProjectRelease>, BackendError> {
        Ok(self
            .enter("get_project_releases_by_stability")?
            .releases_by_stability
            .clone())
    }
}

/// UTC instant at a whole hour
pub fn instant(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

/// Metrics start used by the shared setups
pub fn metrics_start() -> DateTime<Utc> {
    instant(2021, 10, 1, 0)
}

/// "Now" used by the shared setups, 19 days after [`metrics_start`]
pub fn test_now() -> DateTime<Utc> {
    instant(2021, 10, 20, 0)
}

/// Inline proxy on a frozen clock recording into a memory sink
pub fn setup_test_duplex(
    primary: Arc<ScriptedBackend>,
    secondary: Arc<ScriptedBackend>,
) -> (DuplexBackend, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let config = DuplexConfig::new().with_metrics_start(metrics_start());
    let duplex = DuplexBackend::new(primary, secondary, config)
        .with_clock(Arc::new(FixedClock(test_now())))
        .with_sink(sink.clone());
    (duplex, sink)
}

/// Sessions count request starting at `start`
pub fn sessions_count_request(start: DateTime<Utc>) -> SessionsCountRequest {
    SessionsCountRequest {
        project_id: ProjectId(1),
        rollup_secs: 3600,
        start,
        end: start + chrono::Duration::days(1),
        environment_id: None,
    }
}

/// Fixtures answering only the sessions count
pub fn sessions_count_fixtures(count: u64) -> Fixtures {
    Fixtures {
        sessions_count: count,
        ..Fixtures::default()
    }
}
