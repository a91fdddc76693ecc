//! Invoking harness: drives the scenario entry points for a whole run
//!
//! Every configured scenario runs concurrently. Each one starts iterations at
//! a constant arrival rate on a bounded, growable worker pool; iterations that
//! find no free worker are dropped and counted. At the end the recorded
//! metrics are checked against the configured thresholds.

pub mod metrics;
pub mod schedule;
pub mod thresholds;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::config::{RunConfig, ScenarioConfig};
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::check::CheckCounts;
use crate::error::LoadgenResult;
use crate::health;
use crate::scenarios::Scenarios;
use metrics::MetricsRecorder;
use schedule::{ArrivalSchedule, WorkerPool};
use thresholds::{Threshold, ThresholdReport};

/// What one scenario did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSummary {
    pub name: String,
    pub tag: String,
    pub planned_iterations: u64,
    pub completed_iterations: u64,
    pub dropped_iterations: u64,
    /// Largest worker pool size reached
    pub peak_vus: usize,
    pub elapsed: Duration,
}

/// Outcome of a full run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scenarios: Vec<ScenarioSummary>,
    pub checks: Vec<(String, CheckCounts)>,
    pub thresholds: ThresholdReport,
}

impl RunReport {
    /// True when every threshold held
    pub fn passed(&self) -> bool {
        self.thresholds.passed()
    }
}

/// Run one constant-arrival-rate scenario to completion
///
/// Samples are recorded under `run_tags` merged with the scenario's own tags.
pub async fn run_scenario(
    config: ScenarioConfig,
    run_tags: &BTreeMap<String, String>,
    scenarios: Scenarios,
    metrics: MetricsRecorder,
) -> LoadgenResult<ScenarioSummary> {
    let schedule = ArrivalSchedule::from_config(&config)?;
    let tag = config.metric_tag();
    let metric_tags: Arc<[String]> = config.metric_tags(run_tags).into();
    let mut pool = WorkerPool::new(config.pre_allocated_vus, config.max_vus);

    info!(
        scenario = %config.name,
        exec = config.exec.as_str(),
        tags = ?metric_tags,
        iterations = schedule.iterations,
        interval_us = schedule.interval.as_micros() as u64,
        "Starting scenario"
    );

    let started = Instant::now();
    let mut ticker = interval(schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut workers = JoinSet::new();
    let mut completed = 0u64;
    let mut dropped = 0u64;

    for _ in 0..schedule.iterations {
        ticker.tick().await;

        let Some(permit) = pool.acquire() else {
            dropped += 1;
            continue;
        };

        let scenarios = scenarios.clone();
        let metrics = metrics.clone();
        let metric_tags = metric_tags.clone();
        let exec = config.exec;
        workers.spawn(async move {
            let sample = scenarios.run(exec).await;
            metrics.record(&metric_tags, &sample).await;
            drop(permit);
        });

        while let Some(joined) = workers.try_join_next() {
            completed += reap(&config.name, joined);
        }
    }

    while let Some(joined) = workers.join_next().await {
        completed += reap(&config.name, joined);
    }

    if dropped > 0 {
        warn!(
            scenario = %config.name,
            "{} iterations dropped: all {} workers busy",
            dropped,
            pool.allocated()
        );
    }

    Ok(ScenarioSummary {
        name: config.name,
        tag,
        planned_iterations: schedule.iterations,
        completed_iterations: completed,
        dropped_iterations: dropped,
        peak_vus: pool.allocated(),
        elapsed: started.elapsed(),
    })
}

fn reap(scenario: &str, joined: Result<(), tokio::task::JoinError>) -> u64 {
    match joined {
        Ok(()) => 1,
        Err(e) => {
            error!(scenario = scenario, "Iteration task failed: {}", e);
            0
        }
    }
}

/// Execute a complete run: probe the target, run all scenarios, judge thresholds
pub async fn run(config: &RunConfig) -> LoadgenResult<RunReport> {
    config.validate()?;
    let thresholds = Threshold::from_config(&config.thresholds)?;
    let scenarios = Scenarios::from_config(config)?;

    health::wait_for_service(scenarios.generator()).await?;

    info!(
        base_url = %config.target.base_url,
        tags = ?config.tags,
        "Starting run with {} scenarios",
        config.scenarios.len()
    );

    let metrics = MetricsRecorder::new();
    let mut runs = JoinSet::new();
    for (index, scenario) in config.scenarios.iter().enumerate() {
        let scenario = scenario.clone();
        let run_tags = config.tags.clone();
        let scenarios = scenarios.clone();
        let metrics = metrics.clone();
        runs.spawn(async move {
            let result = run_scenario(scenario, &run_tags, scenarios, metrics).await;
            (index, result)
        });
    }

    let mut summaries = Vec::with_capacity(config.scenarios.len());
    while let Some(joined) = runs.join_next().await {
        match joined {
            Ok((index, result)) => summaries.push((index, result?)),
            Err(e) => error!("Scenario task failed: {}", e),
        }
    }
    summaries.sort_by_key(|(index, _)| *index);
    let summaries: Vec<ScenarioSummary> = summaries.into_iter().map(|(_, s)| s).collect();

    for summary in &summaries {
        info!(
            scenario = %summary.name,
            completed = summary.completed_iterations,
            dropped = summary.dropped_iterations,
            peak_vus = summary.peak_vus,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Scenario finished"
        );
    }

    let checks = scenarios.tally().snapshot().await;
    for (name, counts) in &checks {
        info!(
            "Check '{}': {} passed, {} failed ({:.2}%)",
            name,
            counts.passes,
            counts.fails,
            counts.pass_rate() * 100.0
        );
    }

    let snapshot = metrics.snapshot().await;
    let report = ThresholdReport::evaluate(&thresholds, &snapshot);
    for result in &report.results {
        let observed = result
            .observed
            .map_or_else(|| "no data".to_string(), |value| format!("{value:.4}"));
        if result.passed {
            info!("Threshold '{}' passed (observed {})", result.threshold, observed);
        } else {
            warn!("Threshold '{}' crossed (observed {})", result.threshold, observed);
        }
    }

    Ok(RunReport {
        scenarios: summaries,
        checks,
        thresholds: report,
    })
}
