//! Request metrics grouped by `key:value` tags

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hdrhistogram::Histogram;
use tokio::sync::Mutex;
use tracing::warn;

use crate::scenarios::Sample;

/// Whether a response counts towards `http_req_failed`
///
/// Anything outside 200-399, or no response at all, is a failed request.
pub fn is_http_failure(status: Option<u16>) -> bool {
    !matches!(status, Some(200..=399))
}

/// Significant figures kept by every latency histogram
const LATENCY_SIGFIGS: u8 = 3;

fn latency_histogram() -> Histogram<u64> {
    Histogram::new(LATENCY_SIGFIGS).expect("Failed to create latency histogram")
}

/// Aggregates for every sample sharing one tag set
#[derive(Debug, Clone)]
struct TagMetrics {
    /// Latencies of requests that received a response, in microseconds
    latency_us: Histogram<u64>,
    requests: u64,
    failed: u64,
}

impl TagMetrics {
    fn new() -> Self {
        Self {
            latency_us: latency_histogram(),
            requests: 0,
            failed: 0,
        }
    }
}

/// Shared recorder fed by every worker
///
/// Samples are bucketed by their full, sorted tag set so a selection on any
/// single tag counts each request once.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    buckets: Arc<Mutex<HashMap<Vec<String>, TagMetrics>>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one iteration under its `key:value` tags, e.g. `test_type:addExpense`
    pub async fn record(&self, tags: &[String], sample: &Sample) {
        let mut buckets = self.buckets.lock().await;
        let metrics = buckets
            .entry(tags.to_vec())
            .or_insert_with(TagMetrics::new);

        metrics.requests += 1;
        if is_http_failure(sample.status) {
            metrics.failed += 1;
        }
        if sample.status.is_some() {
            metrics.latency_us.saturating_record(duration_us(sample.latency));
        }
    }

    /// Freeze the current aggregates for evaluation
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let buckets = self.buckets.lock().await;
        MetricsSnapshot {
            buckets: buckets.clone(),
        }
    }
}

fn duration_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

fn us_to_ms(value: f64) -> f64 {
    value / 1_000.0
}

/// Point-in-time copy of all recorded metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    buckets: HashMap<Vec<String>, TagMetrics>,
}

impl MetricsSnapshot {
    /// Samples carrying `tag`, or every sample when `tag` is `None`
    pub fn series(&self, tag: Option<&str>) -> Series {
        let mut series = Series::new();
        let selected = self.buckets.iter().filter(|(tags, _)| {
            tag.is_none_or(|wanted| tags.iter().any(|t| t.as_str() == wanted))
        });

        for (_, metrics) in selected {
            series.requests += metrics.requests;
            series.failed += metrics.failed;
            if let Err(e) = series.latency_us.add(&metrics.latency_us) {
                warn!("Dropping latency samples while merging histograms: {:?}", e);
            }
        }

        series
    }

    /// Distinct tags seen so far, sorted
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.buckets.keys().flatten().cloned().collect();
        tags.sort();
        tags.dedup();
        tags
    }
}

/// Latency histogram and failure counts for one selection of tags
///
/// Latency statistics are in milliseconds, accurate to three significant
/// figures.
#[derive(Debug, Clone)]
pub struct Series {
    latency_us: Histogram<u64>,
    pub requests: u64,
    pub failed: u64,
}

impl Series {
    fn new() -> Self {
        Self {
            latency_us: latency_histogram(),
            requests: 0,
            failed: 0,
        }
    }

    /// Fraction of failed requests, `None` without requests
    pub fn failure_rate(&self) -> Option<f64> {
        (self.requests > 0).then(|| self.failed as f64 / self.requests as f64)
    }

    fn has_latency(&self) -> bool {
        self.latency_us.len() > 0
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.has_latency().then(|| {
            let quantile = p.clamp(0.0, 100.0) / 100.0;
            us_to_ms(self.latency_us.value_at_quantile(quantile) as f64)
        })
    }

    pub fn avg(&self) -> Option<f64> {
        self.has_latency()
            .then(|| us_to_ms(self.latency_us.mean()))
    }

    pub fn min(&self) -> Option<f64> {
        self.has_latency()
            .then(|| us_to_ms(self.latency_us.min() as f64))
    }

    pub fn max(&self) -> Option<f64> {
        self.has_latency()
            .then(|| us_to_ms(self.latency_us.max() as f64))
    }

    pub fn med(&self) -> Option<f64> {
        self.percentile(50.0)
    }
}
