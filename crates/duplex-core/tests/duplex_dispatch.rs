//! Integration tests for the shadow proxy

use duplex_core::prelude::*;
use duplex_core::{CrashFreeRates, ReleaseSessionsTimeBounds, ShadowFailure};
use duplex_compare::DiscrepancyKind;
use duplex_test_utils::{
    instant, metrics_start, sessions_count_fixtures, sessions_count_request, setup_test_duplex,
    test_now, Fixtures, ScriptedBackend,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const SESSIONS_COUNT: &str = "get_project_sessions_count";

fn after_metrics_start() -> chrono::DateTime<chrono::Utc> {
    instant(2021, 10, 10, 0)
}

fn only_failure(sink: &MemorySink) -> ShadowFailure {
    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert!(sink.reports().is_empty());
    failures.into_iter().next().unwrap()
}

#[tokio::test]
async fn test_matching_backends_record_clean_report() {
    let primary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(1000)));
    let secondary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(1020)));
    let (duplex, sink) = setup_test_duplex(primary.clone(), secondary.clone());

    let request = sessions_count_request(after_metrics_start());
    let count = duplex.get_project_sessions_count(&request).await.unwrap();

    assert_eq!(count, 1000);
    assert_eq!(primary.calls(SESSIONS_COUNT), 1);
    assert_eq!(secondary.calls(SESSIONS_COUNT), 1);

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_match());
    assert_eq!(reports[0].context.operation, SESSIONS_COUNT);
    assert_eq!(reports[0].context.arguments["project_id"], 1);
    assert_eq!(reports[0].context.timestamp, test_now());
    assert_eq!(reports[0].rollup_secs, 3600);
}

#[tokio::test]
async fn test_drifting_counter_is_reported_but_primary_returned() {
    let primary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(100)));
    let secondary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(110)));
    let (duplex, sink) = setup_test_duplex(primary, secondary);

    let count = duplex
        .get_project_sessions_count(&sessions_count_request(after_metrics_start()))
        .await
        .unwrap();

    assert_eq!(count, 100);
    let reports = sink.reports();
    assert_eq!(reports[0].discrepancies.len(), 1);
    assert_eq!(reports[0].discrepancies[0].kind, DiscrepancyKind::ValueMismatch);
}

#[tokio::test]
async fn test_secondary_error_never_reaches_caller() {
    let primary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(42)));
    let secondary = Arc::new(ScriptedBackend::failing(BackendError::Unavailable(
        "secondary cluster".to_string(),
    )));
    let (duplex, sink) = setup_test_duplex(primary, secondary.clone());

    let count = duplex
        .get_project_sessions_count(&sessions_count_request(after_metrics_start()))
        .await;

    assert_eq!(count, Ok(42));
    assert_eq!(secondary.calls(SESSIONS_COUNT), 1);
    let failure = only_failure(&sink);
    assert_eq!(failure.context.operation, SESSIONS_COUNT);
    assert_eq!(failure.error, "backend unavailable: secondary cluster");
}

#[tokio::test]
async fn test_secondary_panic_is_isolated() {
    let primary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(7)));
    let secondary = Arc::new(ScriptedBackend::panicking("index out of bounds"));
    let (duplex, sink) = setup_test_duplex(primary, secondary);

    let count = duplex
        .get_project_sessions_count(&sessions_count_request(after_metrics_start()))
        .await;

    assert_eq!(count, Ok(7));
    assert_eq!(
        only_failure(&sink).error,
        "secondary backend panicked: index out of bounds"
    );
}

#[tokio::test]
async fn test_primary_error_propagates_without_shadow() {
    let primary = Arc::new(ScriptedBackend::failing(BackendError::Timeout {
        duration_secs: 30,
    }));
    let secondary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(1)));
    let (duplex, sink) = setup_test_duplex(primary, secondary.clone());

    let result = duplex
        .get_project_sessions_count(&sessions_count_request(after_metrics_start()))
        .await;

    assert_eq!(result, Err(BackendError::Timeout { duration_secs: 30 }));
    assert_eq!(secondary.total_calls(), 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_closed_gate_never_invokes_secondary() {
    let primary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(5)));
    let secondary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(500)));
    let (duplex, sink) = setup_test_duplex(primary, secondary.clone());

    let before = metrics_start() - chrono::Duration::hours(1);
    let count = duplex
        .get_project_sessions_count(&sessions_count_request(before))
        .await
        .unwrap();

    assert_eq!(count, 5);
    assert_eq!(secondary.total_calls(), 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_sessions_query_is_never_shadowed() {
    let primary = Arc::new(ScriptedBackend::new(Fixtures {
        sessions_query: Some(duplex_core::SessionsQueryResult {
            start: after_metrics_start(),
            end: test_now(),
            intervals: Vec::new(),
            groups: Vec::new(),
            query: "release:1.0".to_string(),
        }),
        ..Fixtures::default()
    }));
    let secondary = Arc::new(ScriptedBackend::default());
    let (duplex, sink) = setup_test_duplex(primary, secondary.clone());

    let request = SessionsQueryRequest {
        org_id: duplex_core::OrganizationId(1),
        query: duplex_core::QueryDefinition {
            query: "release:1.0".to_string(),
            fields: vec!["sum(session)".to_string()],
            group_by: Vec::new(),
            start: after_metrics_start(),
            end: test_now(),
            rollup_secs: 3600,
        },
        span_op: "sessions.query".to_string(),
    };
    let result = duplex.run_sessions_query(&request).await.unwrap();

    assert_eq!(result.query, "release:1.0");
    assert_eq!(secondary.total_calls(), 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_crash_free_rate_drift_is_reported_by_path() {
    let rates = |rate: f64| Fixtures {
        crash_free_rates: [(
            ProjectId(1),
            CrashFreeRates {
                current_crash_free_rate: Some(rate),
                previous_crash_free_rate: Some(0.5),
            },
        )]
        .into_iter()
        .collect(),
        ..Fixtures::default()
    };
    let primary = Arc::new(ScriptedBackend::new(rates(0.50)));
    let secondary = Arc::new(ScriptedBackend::new(rates(0.51)));
    let (duplex, sink) = setup_test_duplex(primary, secondary);

    let request = CrashFreeRatesRequest {
        project_ids: vec![ProjectId(1)],
        current_start: instant(2021, 10, 15, 0),
        current_end: test_now(),
        previous_start: after_metrics_start(),
        previous_end: instant(2021, 10, 15, 0),
        rollup_secs: 86_400,
        org_id: None,
    };
    let result = duplex
        .get_current_and_previous_crash_free_rates(&request)
        .await
        .unwrap();

    assert_eq!(result[&ProjectId(1)].current_crash_free_rate, Some(0.50));
    let reports = sink.reports();
    assert_eq!(reports[0].rollup_secs, 86_400);
    let discrepancies = &reports[0].discrepancies;
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].path, "[1].currentCrashFreeRate");
    assert!(discrepancies[0]
        .message
        .starts_with("fields with different values at [1].currentCrashFreeRate"));
}

async fn time_bounds_calls(lower_bound: Option<&str>) -> usize {
    let bounds = ReleaseSessionsTimeBounds {
        sessions_lower_bound: lower_bound.map(str::to_string),
        sessions_upper_bound: Some("2021-10-19T00:00:00Z".to_string()),
    };
    let primary = Arc::new(ScriptedBackend::new(Fixtures {
        time_bounds: bounds.clone(),
        ..Fixtures::default()
    }));
    let secondary = Arc::new(ScriptedBackend::new(Fixtures {
        time_bounds: bounds,
        ..Fixtures::default()
    }));
    let (duplex, _sink) = setup_test_duplex(primary, secondary.clone());

    let request = TimeBoundsRequest {
        project_id: ProjectId(1),
        release: "1.0.0".to_string(),
        org_id: duplex_core::OrganizationId(1),
        environments: None,
    };
    duplex
        .get_release_sessions_time_bounds(&request)
        .await
        .unwrap();
    secondary.calls("get_release_sessions_time_bounds")
}

#[tokio::test]
async fn test_time_bounds_gate_follows_lower_bound() {
    assert_eq!(time_bounds_calls(None).await, 1);
    assert_eq!(time_bounds_calls(Some("2021-10-05T00:00:00Z")).await, 1);
    assert_eq!(time_bounds_calls(Some("2021-09-01T00:00:00Z")).await, 0);
    assert_eq!(time_bounds_calls(Some("last tuesday")).await, 0);
}

fn releases_count_request(stats_period: Option<&str>, scope: &str) -> ReleasesCountRequest {
    ReleasesCountRequest {
        org_id: duplex_core::OrganizationId(1),
        project_ids: vec![ProjectId(1)],
        scope: scope.to_string(),
        stats_period: stats_period.map(str::to_string),
        environments: None,
    }
}

#[tokio::test]
async fn test_stats_period_selects_rollup_and_gate() {
    let fixtures = Fixtures {
        releases_count: 12,
        ..Fixtures::default()
    };
    let primary = Arc::new(ScriptedBackend::new(fixtures.clone()));
    let secondary = Arc::new(ScriptedBackend::new(fixtures));
    let (duplex, sink) = setup_test_duplex(primary, secondary.clone());

    // 7 days back is after metrics start, 30 days back is not
    duplex
        .get_project_releases_count(&releases_count_request(Some("7d"), "sessions"))
        .await
        .unwrap();
    duplex
        .get_project_releases_count(&releases_count_request(Some("30d"), "sessions"))
        .await
        .unwrap();
    duplex
        .get_project_releases_count(&releases_count_request(Some("30d"), "users_24h"))
        .await
        .unwrap();

    assert_eq!(secondary.calls("get_project_releases_count"), 2);
    let reports = sink.reports();
    assert_eq!(reports[0].rollup_secs, 86_400);
    assert_eq!(reports[1].rollup_secs, 3600);
}

#[tokio::test]
async fn test_invalid_stats_period_skips_comparison() {
    let primary = Arc::new(ScriptedBackend::new(Fixtures {
        releases_by_stability: vec![ProjectRelease::new(1, "1.0.0")],
        ..Fixtures::default()
    }));
    let secondary = Arc::new(ScriptedBackend::default());
    let (duplex, sink) = setup_test_duplex(primary, secondary.clone());

    let request = ReleasesByStabilityRequest {
        project_ids: vec![ProjectId(1)],
        offset: None,
        limit: Some(10),
        scope: "crash_free_sessions".to_string(),
        stats_period: Some("3w".to_string()),
        environments: None,
    };
    let releases = duplex
        .get_project_releases_by_stability(&request)
        .await
        .unwrap();

    assert_eq!(releases, vec![ProjectRelease::new(1, "1.0.0")]);
    assert_eq!(secondary.total_calls(), 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_background_mode_delivers_through_channel() {
    let primary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(1000)));
    let secondary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(2000)));
    let (sink, mut rx) = ChannelSink::new();
    let config = DuplexConfig::new()
        .with_metrics_start(metrics_start())
        .with_mode(ShadowMode::Background);
    let duplex = DuplexBackend::new(primary, secondary, config)
        .with_clock(Arc::new(FixedClock(test_now())))
        .with_sink(Arc::new(sink));

    let count = duplex
        .get_project_sessions_count(&sessions_count_request(after_metrics_start()))
        .await
        .unwrap();
    assert_eq!(count, 1000);

    match rx.recv().await {
        Some(ShadowEvent::Compared(report)) => {
            assert_eq!(report.context.operation, SESSIONS_COUNT);
            assert_eq!(report.discrepancies.len(), 1);
        }
        other => panic!("expected a comparison report, got {other:?}"),
    }
}

#[tokio::test]
async fn test_background_mode_isolates_panics() {
    let primary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(3)));
    let secondary = Arc::new(ScriptedBackend::panicking("boom"));
    let (sink, mut rx) = ChannelSink::new();
    let config = DuplexConfig::new()
        .with_metrics_start(metrics_start())
        .with_mode(ShadowMode::Background);
    let duplex = DuplexBackend::new(primary, secondary, config)
        .with_clock(Arc::new(FixedClock(test_now())))
        .with_sink(Arc::new(sink));

    let count = duplex
        .get_project_sessions_count(&sessions_count_request(after_metrics_start()))
        .await;
    assert_eq!(count, Ok(3));

    assert!(matches!(rx.recv().await, Some(ShadowEvent::Failed(_))));
}

#[test]
fn test_background_mode_without_runtime_runs_inline() {
    let primary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(10)));
    let secondary = Arc::new(ScriptedBackend::new(sessions_count_fixtures(10)));
    let sink = Arc::new(MemorySink::new());
    let config = DuplexConfig::new()
        .with_metrics_start(metrics_start())
        .with_mode(ShadowMode::Background);
    let duplex = DuplexBackend::new(primary, secondary, config)
        .with_clock(Arc::new(FixedClock(test_now())))
        .with_sink(sink.clone());

    let count = futures::executor::block_on(
        duplex.get_project_sessions_count(&sessions_count_request(after_metrics_start())),
    );

    assert_eq!(count, Ok(10));
    assert_eq!(sink.reports().len(), 1);
}
