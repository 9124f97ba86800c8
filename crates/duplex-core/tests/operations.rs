//! Every horizon-gated operation driven through the proxy

use chrono::{DateTime, Duration, Utc};
use duplex_core::prelude::*;
use duplex_core::{OrganizationId, OverviewStat, ProjectOrRelease};
use duplex_test_utils::{instant, sessions_count_request, test_now, Fixtures, ScriptedBackend};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const DEFAULT_ROLLUP: i64 = 900;

/// Operation and the rollup its report carries
const OPERATIONS: [(&str, i64); 13] = [
    ("get_current_and_previous_crash_free_rates", 7200),
    ("get_release_adoption", DEFAULT_ROLLUP),
    ("check_has_health_data", DEFAULT_ROLLUP),
    ("check_releases_have_health_data", DEFAULT_ROLLUP),
    ("get_release_health_data_overview", DEFAULT_ROLLUP),
    ("get_crash_free_breakdown", DEFAULT_ROLLUP),
    ("get_changed_project_release_model_adoptions", DEFAULT_ROLLUP),
    ("get_oldest_health_data_for_releases", DEFAULT_ROLLUP),
    ("get_project_releases_count", 86_400),
    ("get_project_release_stats", 60),
    ("get_project_sessions_count", 3600),
    ("get_num_sessions_per_project", 300),
    ("get_project_releases_by_stability", 86_400),
];

fn window_start() -> DateTime<Utc> {
    instant(2021, 10, 10, 0)
}

fn setup_with_metrics_start(
    metrics_start: DateTime<Utc>,
) -> (DuplexBackend, Arc<ScriptedBackend>, Arc<MemorySink>) {
    let primary = Arc::new(ScriptedBackend::new(Fixtures::default()));
    let secondary = Arc::new(ScriptedBackend::new(Fixtures::default()));
    let sink = Arc::new(MemorySink::new());
    let config = DuplexConfig::new()
        .with_metrics_start(metrics_start)
        .with_default_rollup(DEFAULT_ROLLUP);
    let duplex = DuplexBackend::new(primary, secondary.clone(), config)
        .with_clock(Arc::new(FixedClock(test_now())))
        .with_sink(sink.clone());
    (duplex, secondary, sink)
}

async fn call(duplex: &DuplexBackend, operation: &str) -> Result<(), BackendError> {
    let start = window_start();
    let end = test_now();
    let releases = vec![ProjectRelease::new(1, "1.0.0")];

    match operation {
        "get_current_and_previous_crash_free_rates" => duplex
            .get_current_and_previous_crash_free_rates(&CrashFreeRatesRequest {
                project_ids: vec![ProjectId(1)],
                current_start: start + Duration::days(5),
                current_end: end,
                previous_start: start,
                previous_end: start + Duration::days(5),
                rollup_secs: 7200,
                org_id: None,
            })
            .await
            .map(drop),
        "get_release_adoption" => duplex
            .get_release_adoption(&ReleaseAdoptionRequest {
                project_releases: releases,
                environments: None,
                now: None,
                org_id: Some(OrganizationId(1)),
            })
            .await
            .map(drop),
        "check_has_health_data" => duplex
            .check_has_health_data(&HasHealthDataRequest {
                projects: vec![ProjectOrRelease::Project(ProjectId(1))],
            })
            .await
            .map(drop),
        "check_releases_have_health_data" => duplex
            .check_releases_have_health_data(&ReleasesHealthDataRequest {
                org_id: OrganizationId(1),
                project_ids: vec![ProjectId(1)],
                release_versions: vec!["1.0.0".into()],
                start,
                end,
            })
            .await
            .map(drop),
        "get_release_health_data_overview" => duplex
            .get_release_health_data_overview(&HealthOverviewRequest {
                project_releases: releases,
                environments: None,
                summary_stats_period: None,
                health_stats_period: None,
                stat: None,
            })
            .await
            .map(drop),
        "get_crash_free_breakdown" => duplex
            .get_crash_free_breakdown(&CrashFreeBreakdownRequest {
                project_id: ProjectId(1),
                release: "1.0.0".into(),
                start,
                environments: None,
            })
            .await
            .map(drop),
        "get_changed_project_release_model_adoptions" => duplex
            .get_changed_project_release_model_adoptions(&ChangedAdoptionsRequest {
                project_ids: vec![ProjectId(1)],
            })
            .await
            .map(drop),
        "get_oldest_health_data_for_releases" => duplex
            .get_oldest_health_data_for_releases(&OldestHealthDataRequest {
                project_releases: releases,
            })
            .await
            .map(drop),
        "get_project_releases_count" => duplex
            .get_project_releases_count(&ReleasesCountRequest {
                org_id: OrganizationId(1),
                project_ids: vec![ProjectId(1)],
                scope: "sessions".to_string(),
                stats_period: Some("7d".to_string()),
                environments: None,
            })
            .await
            .map(drop),
        "get_project_release_stats" => duplex
            .get_project_release_stats(&ReleaseStatsRequest {
                project_id: ProjectId(1),
                release: "1.0.0".into(),
                stat: OverviewStat::Sessions,
                rollup_secs: 60,
                start,
                end,
                environments: None,
            })
            .await
            .map(drop),
        "get_project_sessions_count" => duplex
            .get_project_sessions_count(&sessions_count_request(start))
            .await
            .map(drop),
        "get_num_sessions_per_project" => duplex
            .get_num_sessions_per_project(&SessionsPerProjectRequest {
                project_ids: vec![ProjectId(1)],
                start,
                end,
                environment_ids: None,
                rollup_secs: Some(300),
            })
            .await
            .map(drop),
        "get_project_releases_by_stability" => duplex
            .get_project_releases_by_stability(&ReleasesByStabilityRequest {
                project_ids: vec![ProjectId(1)],
                offset: None,
                limit: Some(10),
                scope: "sessions".to_string(),
                stats_period: Some("7d".to_string()),
                environments: None,
            })
            .await
            .map(drop),
        other => panic!("no request for {other}"),
    }
}

#[tokio::test]
async fn test_every_operation_shadows_inside_the_horizon() {
    let (duplex, secondary, sink) = setup_with_metrics_start(instant(2021, 1, 1, 0));

    for (operation, rollup_secs) in OPERATIONS {
        call(&duplex, operation).await.unwrap();
        assert_eq!(secondary.calls(operation), 1, "{operation}");

        let reports = sink.reports();
        let report = reports.last().unwrap();
        assert_eq!(report.context.operation, operation);
        assert_eq!(report.rollup_secs, rollup_secs, "{operation}");
        assert!(report.is_match(), "{operation}: {:?}", report.discrepancies);
    }

    assert_eq!(sink.reports().len(), OPERATIONS.len());
    assert!(sink.failures().is_empty());
}

#[tokio::test]
async fn test_every_operation_skips_before_the_horizon() {
    let (duplex, secondary, sink) = setup_with_metrics_start(test_now());

    for (operation, _) in OPERATIONS {
        call(&duplex, operation).await.unwrap();
        assert_eq!(secondary.calls(operation), 0, "{operation}");
    }

    assert_eq!(secondary.total_calls(), 0);
    assert!(sink.reports().is_empty());
    assert!(sink.failures().is_empty());
}

#[tokio::test]
async fn test_sessions_per_project_defaults_its_rollup() {
    let (duplex, _, sink) = setup_with_metrics_start(instant(2021, 1, 1, 0));
    duplex
        .get_num_sessions_per_project(&SessionsPerProjectRequest {
            project_ids: vec![ProjectId(1)],
            start: window_start(),
            end: test_now(),
            environment_ids: None,
            rollup_secs: None,
        })
        .await
        .unwrap();

    assert_eq!(sink.reports()[0].rollup_secs, DEFAULT_ROLLUP);
}
