//! End-to-end runs of the harness against a mock target

mod support;

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::StatusCode;
use common::config::{PayloadConfig, RunConfig, ScenarioConfig, ScenarioExec, ThresholdConfig};
use loadgen::harness::{self, metrics::MetricsRecorder};
use loadgen::{Check, RequestGenerator, Scenarios};
use support::MockTarget;

fn scenario(
    name: &str,
    exec: ScenarioExec,
    rate: u64,
    duration: &str,
    max_vus: usize,
) -> ScenarioConfig {
    ScenarioConfig {
        name: name.to_string(),
        exec,
        rate,
        time_unit: "1s".to_string(),
        duration: duration.to_string(),
        pre_allocated_vus: 1,
        max_vus,
        tags: BTreeMap::from([("test_type".to_string(), exec.as_str().to_string())]),
    }
}

fn short_run(mock: &MockTarget) -> RunConfig {
    RunConfig {
        target: mock.target(),
        scenarios: vec![
            scenario("addExpense_constant", ScenarioExec::AddExpense, 20, "500ms", 4),
            scenario("addPayments_constant", ScenarioExec::AddPayments, 20, "500ms", 4),
        ],
        ..RunConfig::default()
    }
}

#[tokio::test]
async fn test_run_against_healthy_target_passes() {
    let mock = MockTarget::spawn(StatusCode::OK).await;
    let report = harness::run(&short_run(&mock)).await.unwrap();

    assert!(report.passed());
    assert_eq!(report.scenarios.len(), 2);
    for summary in &report.scenarios {
        assert_eq!(summary.planned_iterations, 10);
        assert_eq!(
            summary.completed_iterations + summary.dropped_iterations,
            summary.planned_iterations
        );
        assert!(summary.peak_vus <= 4);
    }
    assert_eq!(report.scenarios[0].tag, "test_type:addExpense");

    let completed: u64 = report.scenarios.iter().map(|s| s.completed_iterations).sum();
    assert_eq!(mock.requests().len() as u64, completed);

    let (name, counts) = &report.checks[0];
    assert_eq!(name, "is status 200");
    assert_eq!(counts.passes, completed);
    assert_eq!(counts.fails, 0);
    assert_eq!(report.thresholds.results.len(), 4);
}

#[tokio::test]
async fn test_run_against_failing_target_crosses_thresholds() {
    let mock = MockTarget::spawn(StatusCode::INTERNAL_SERVER_ERROR).await;
    let report = harness::run(&short_run(&mock)).await.unwrap();

    assert!(!report.passed());
    let crossed: Vec<_> = report
        .thresholds
        .failures()
        .map(|result| result.threshold.clone())
        .collect();
    assert_eq!(
        crossed,
        vec![
            "http_req_failed{test_type:addExpense}: rate<0.01".to_string(),
            "http_req_failed{test_type:addPayments}: rate<0.01".to_string(),
        ]
    );
    assert_eq!(report.checks[0].1.passes, 0);
}

#[tokio::test]
async fn test_thresholds_select_run_and_custom_scenario_tags() {
    let mock = MockTarget::spawn(StatusCode::INTERNAL_SERVER_ERROR).await;
    let mut expense = scenario("addExpense_constant", ScenarioExec::AddExpense, 20, "500ms", 4);
    expense.tags.insert("region".to_string(), "eu".to_string());

    let config = RunConfig {
        target: mock.target(),
        scenarios: vec![expense],
        thresholds: vec![
            ThresholdConfig {
                metric: "http_req_failed{region:eu}".to_string(),
                conditions: vec!["rate<0.01".to_string()],
            },
            ThresholdConfig {
                metric: "http_req_failed{test:api-performance}".to_string(),
                conditions: vec!["rate<0.01".to_string()],
            },
            ThresholdConfig {
                metric: "http_req_duration{region:us}".to_string(),
                conditions: vec!["p(95)<200".to_string()],
            },
        ],
        ..RunConfig::default()
    };
    let report = harness::run(&config).await.unwrap();

    assert!(!report.passed());
    let results = &report.thresholds.results;
    assert_eq!(results[0].observed, Some(1.0));
    assert!(!results[0].passed);
    assert_eq!(results[1].observed, Some(1.0));
    assert!(!results[1].passed);
    // No scenario carries this tag
    assert_eq!(results[2].observed, None);
    assert!(results[2].passed);
}

#[tokio::test]
async fn test_run_rejects_invalid_threshold() {
    let mock = MockTarget::spawn(StatusCode::OK).await;
    let mut config = short_run(&mock);
    config.thresholds = vec![ThresholdConfig {
        metric: "http_req_failed".to_string(),
        conditions: vec!["p(95)<200".to_string()],
    }];

    let result = harness::run(&config).await;
    assert!(matches!(result, Err(loadgen::LoadgenError::Threshold(_))));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_saturated_pool_drops_iterations() {
    let mock = MockTarget::spawn_with_delay(StatusCode::OK, Duration::from_millis(300)).await;
    let generator = RequestGenerator::new(&mock.target()).unwrap();
    let scenarios = Scenarios::new(generator, PayloadConfig::default(), Check::status_is(200));

    // 50/s for 200ms is 10 iterations, one worker held 300ms per request
    let config = scenario("saturated", ScenarioExec::AddExpense, 50, "200ms", 1);
    let metrics = MetricsRecorder::new();
    let summary = harness::run_scenario(config, &BTreeMap::new(), scenarios, metrics.clone())
        .await
        .unwrap();

    assert_eq!(summary.planned_iterations, 10);
    assert_eq!(summary.peak_vus, 1);
    assert!(summary.dropped_iterations > 0);
    assert_eq!(summary.completed_iterations + summary.dropped_iterations, 10);

    let series = metrics.snapshot().await.series(Some("test_type:addExpense"));
    assert_eq!(series.requests, summary.completed_iterations);
    assert_eq!(series.failed, 0);
}

#[tokio::test]
async fn test_pool_grows_under_slow_target() {
    let mock = MockTarget::spawn_with_delay(StatusCode::OK, Duration::from_millis(100)).await;
    let generator = RequestGenerator::new(&mock.target()).unwrap();
    let scenarios = Scenarios::new(generator, PayloadConfig::default(), Check::status_is(200));

    let config = scenario("growing", ScenarioExec::AddPayments, 50, "400ms", 25);
    let summary =
        harness::run_scenario(config, &BTreeMap::new(), scenarios, MetricsRecorder::new())
        .await
        .unwrap();

    assert!(summary.peak_vus > 1);
    assert!(summary.peak_vus <= 25);
    assert_eq!(summary.dropped_iterations, 0);
    assert_eq!(summary.completed_iterations, 20);
}
