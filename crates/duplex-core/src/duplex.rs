//! Per-operation shadowing
//!
//! Each operation names the schema its results are compared under, the gate
//! that keeps comparisons inside the secondary's data horizon, and the rollup
//! that bounds datetime drift.

use crate::backend::ReleaseHealthBackend;
use crate::dispatch::{DuplexBackend, ShadowCall};
use crate::error::BackendError;
use crate::gate::Gate;
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
use chrono::Duration;
use duplex_compare::{parse_datetime, ComparatorType, Schema};
use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};

use ComparatorType::{Counter, DateTime, Entity, Quantile, Ratio};

fn crash_free_rates_schema() -> Schema {
    Schema::wildcard(Schema::fields([
        ("currentCrashFreeRate", Ratio),
        ("previousCrashFreeRate", Ratio),
    ]))
}

fn adoption_schema() -> Schema {
    Schema::wildcard(Schema::fields([
        ("adoption", Ratio),
        ("sessions_adoption", Ratio),
        ("users_24h", Counter),
        ("project_users_24h", Counter),
        ("sessions_24h", Counter),
        ("project_sessions_24h", Counter),
    ]))
}

fn time_bounds_schema() -> Schema {
    Schema::fields([
        ("sessions_lower_bound", DateTime),
        ("sessions_upper_bound", DateTime),
    ])
}

fn overview_schema() -> Schema {
    Schema::wildcard(Schema::fields([
        ("total_users_24h", Counter),
        ("total_project_users_24h", Counter),
        ("total_sessions_24h", Counter),
        ("total_project_sessions_24h", Counter),
    ]))
}

fn crash_free_breakdown_schema() -> Schema {
    Schema::list(Schema::fields([
        ("date", DateTime),
        ("total_users", Counter),
        ("crash_free_users", Ratio),
        ("total_sessions", Counter),
        ("crash_free_sessions", Ratio),
    ]))
}

fn release_stats_schema() -> Schema {
    let bucket = Schema::fields([("duration_p50", Quantile), ("duration_p90", Quantile)])
        .with_wildcard(Counter);
    Schema::tuple([
        Schema::list(Schema::tuple([Schema::from(Entity), bucket])),
        Schema::wildcard(Counter),
    ])
}

fn sessions_per_project_schema() -> Schema {
    Schema::list(Schema::tuple([Entity, Counter]))
}

#[async_trait::async_trait]
impl ReleaseHealthBackend for DuplexBackend {
    async fn get_current_and_previous_crash_free_rates(
        &self,
        request: &CrashFreeRatesRequest,
    ) -> Result<CurrentAndPreviousCrashFreeRates, BackendError> {
        let primary = self
            .primary()
            .get_current_and_previous_crash_free_rates(request)
            .await;
        self.shadow(
            ShadowCall::new(
                "get_current_and_previous_crash_free_rates",
                request,
                crash_free_rates_schema(),
                request.rollup_secs,
            ),
            primary,
            Gate::from(self.covers(request.previous_start)),
            |backend, request| {
                async move {
                    backend
                        .get_current_and_previous_crash_free_rates(&request)
                        .await
                }
                .boxed()
            },
        )
        .await
    }

    async fn get_release_adoption(
        &self,
        request: &ReleaseAdoptionRequest,
    ) -> Result<ReleasesAdoption, BackendError> {
        let primary = self.primary().get_release_adoption(request).await;
        let now = request.now.unwrap_or_else(|| self.now());
        self.shadow(
            ShadowCall::new(
                "get_release_adoption",
                request,
                adoption_schema(),
                self.default_rollup(),
            ),
            primary,
            Gate::from(self.covers(now - Duration::hours(24))),
            |backend, request| async move { backend.get_release_adoption(&request).await }.boxed(),
        )
        .await
    }

    async fn run_sessions_query(
        &self,
        request: &SessionsQueryRequest,
    ) -> Result<SessionsQueryResult, BackendError> {
        let primary = self.primary().run_sessions_query(request).await;
        self.shadow(
            ShadowCall::new(
                "run_sessions_query",
                request,
                Schema::Infer,
                self.default_rollup(),
            ),
            primary,
            Gate::closed(),
            |backend, request| async move { backend.run_sessions_query(&request).await }.boxed(),
        )
        .await
    }

    async fn get_release_sessions_time_bounds(
        &self,
        request: &TimeBoundsRequest,
    ) -> Result<ReleaseSessionsTimeBounds, BackendError> {
        let primary = self.primary().get_release_sessions_time_bounds(request).await;
        let metrics_start = self.config().metrics_start;
        self.shadow(
            ShadowCall::new(
                "get_release_sessions_time_bounds",
                request,
                time_bounds_schema(),
                self.default_rollup(),
            ),
            primary,
            Gate::when(move |bounds: &ReleaseSessionsTimeBounds| {
                match bounds.sessions_lower_bound.as_deref() {
                    None => true,
                    Some(raw) => parse_datetime(raw).is_some_and(|lower| lower > metrics_start),
                }
            }),
            |backend, request| {
                async move { backend.get_release_sessions_time_bounds(&request).await }.boxed()
            },
        )
        .await
    }

    async fn check_has_health_data(
        &self,
        request: &HasHealthDataRequest,
    ) -> Result<BTreeSet<ProjectOrRelease>, BackendError> {
        let primary = self.primary().check_has_health_data(request).await;
        self.shadow(
            ShadowCall::new(
                "check_has_health_data",
                request,
                Schema::Set,
                self.default_rollup(),
            ),
            primary,
            Gate::from(self.covers_last(Duration::days(90))),
            |backend, request| async move { backend.check_has_health_data(&request).await }.boxed(),
        )
        .await
    }

    async fn check_releases_have_health_data(
        &self,
        request: &ReleasesHealthDataRequest,
    ) -> Result<BTreeSet<ReleaseName>, BackendError> {
        let primary = self.primary().check_releases_have_health_data(request).await;
        self.shadow(
            ShadowCall::new(
                "check_releases_have_health_data",
                request,
                Schema::Set,
                self.default_rollup(),
            ),
            primary,
            Gate::from(self.covers(request.start)),
            |backend, request| {
                async move { backend.check_releases_have_health_data(&request).await }.boxed()
            },
        )
        .await
    }

    async fn get_release_health_data_overview(
        &self,
        request: &HealthOverviewRequest,
    ) -> Result<BTreeMap<ProjectRelease, ReleaseHealthOverview>, BackendError> {
        let primary = self.primary().get_release_health_data_overview(request).await;
        self.shadow(
            ShadowCall::new(
                "get_release_health_data_overview",
                request,
                overview_schema(),
                self.default_rollup(),
            ),
            primary,
            Gate::from(self.covers_last(Duration::days(1))),
            |backend, request| {
                async move { backend.get_release_health_data_overview(&request).await }.boxed()
            },
        )
        .await
    }

    async fn get_crash_free_breakdown(
        &self,
        request: &CrashFreeBreakdownRequest,
    ) -> Result<Vec<CrashFreeBreakdown>, BackendError> {
        let primary = self.primary().get_crash_free_breakdown(request).await;
        self.shadow(
            ShadowCall::new(
                "get_crash_free_breakdown",
                request,
                crash_free_breakdown_schema(),
                self.default_rollup(),
            ),
            primary,
            Gate::from(self.covers(request.start)),
            |backend, request| {
                async move { backend.get_crash_free_breakdown(&request).await }.boxed()
            },
        )
        .await
    }

    async fn get_changed_project_release_model_adoptions(
        &self,
        request: &ChangedAdoptionsRequest,
    ) -> Result<Vec<ProjectRelease>, BackendError> {
        let primary = self
            .primary()
            .get_changed_project_release_model_adoptions(request)
            .await;
        self.shadow(
            ShadowCall::new(
                "get_changed_project_release_model_adoptions",
                request,
                Schema::list(Entity),
                self.default_rollup(),
            ),
            primary,
            Gate::from(self.covers_last(Duration::days(3))),
            |backend, request| {
                async move {
                    backend
                        .get_changed_project_release_model_adoptions(&request)
                        .await
                }
                .boxed()
            },
        )
        .await
    }

    async fn get_oldest_health_data_for_releases(
        &self,
        request: &OldestHealthDataRequest,
    ) -> Result<BTreeMap<ProjectRelease, String>, BackendError> {
        let primary = self
            .primary()
            .get_oldest_health_data_for_releases(request)
            .await;
        self.shadow(
            ShadowCall::new(
                "get_oldest_health_data_for_releases",
                request,
                Schema::wildcard(DateTime),
                self.default_rollup(),
            ),
            primary,
            Gate::from(self.covers_last(Duration::days(90))),
            |backend, request| {
                async move { backend.get_oldest_health_data_for_releases(&request).await }.boxed()
            },
        )
        .await
    }

    async fn get_project_releases_count(
        &self,
        request: &ReleasesCountRequest,
    ) -> Result<u64, BackendError> {
        const OPERATION: &str = "get_project_releases_count";
        let primary = self.primary().get_project_releases_count(request).await;
        let (gate, rollup_secs) =
            self.stats_window(OPERATION, request.stats_period.as_deref(), &request.scope);
        self.shadow(
            ShadowCall::new(OPERATION, request, Schema::from(Counter), rollup_secs),
            primary,
            gate,
            |backend, request| {
                async move { backend.get_project_releases_count(&request).await }.boxed()
            },
        )
        .await
    }

    async fn get_project_release_stats(
        &self,
        request: &ReleaseStatsRequest,
    ) -> Result<ProjectReleaseStats, BackendError> {
        let primary = self.primary().get_project_release_stats(request).await;
        self.shadow(
            ShadowCall::new(
                "get_project_release_stats",
                request,
                release_stats_schema(),
                request.rollup_secs,
            ),
            primary,
            Gate::from(self.covers(request.start)),
            |backend, request| {
                async move { backend.get_project_release_stats(&request).await }.boxed()
            },
        )
        .await
    }

    async fn get_project_sessions_count(
        &self,
        request: &SessionsCountRequest,
    ) -> Result<u64, BackendError> {
        let primary = self.primary().get_project_sessions_count(request).await;
        self.shadow(
            ShadowCall::new(
                "get_project_sessions_count",
                request,
                Schema::from(Counter),
                request.rollup_secs,
            ),
            primary,
            Gate::from(self.covers(request.start)),
            |backend, request| {
                async move { backend.get_project_sessions_count(&request).await }.boxed()
            },
        )
        .await
    }

    async fn get_num_sessions_per_project(
        &self,
        request: &SessionsPerProjectRequest,
    ) -> Result<Vec<ProjectWithCount>, BackendError> {
        let primary = self.primary().get_num_sessions_per_project(request).await;
        self.shadow(
            ShadowCall::new(
                "get_num_sessions_per_project",
                request,
                sessions_per_project_schema(),
                request.rollup_secs.unwrap_or_else(|| self.default_rollup()),
            ),
            primary,
            Gate::from(self.covers(request.start)),
            |backend, request| {
                async move { backend.get_num_sessions_per_project(&request).await }.boxed()
            },
        )
        .await
    }

    async fn get_project_releases_by_stability(
        &self,
        request: &ReleasesByStabilityRequest,
    ) -> Result<Vec<ProjectRelease>, BackendError> {
        const OPERATION: &str = "get_project_releases_by_stability";
        let primary = self
            .primary()
            .get_project_releases_by_stability(request)
            .await;
        let (gate, rollup_secs) =
            self.stats_window(OPERATION, request.stats_period.as_deref(), &request.scope);
        self.shadow(
            ShadowCall::new(OPERATION, request, Schema::list(Entity), rollup_secs),
            primary,
            gate,
            |backend, request| {
                async move { backend.get_project_releases_by_stability(&request).await }.boxed()
            },
        )
        .await
    }
}
