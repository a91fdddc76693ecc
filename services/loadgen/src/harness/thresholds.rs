//! Pass/fail thresholds over aggregated request metrics
//!
//! Metric keys take the form `http_req_duration{test_type:addExpense}` and
//! conditions the form `p(95)<200` or `rate<0.01`. Durations are compared in
//! milliseconds.

use std::fmt;
use std::sync::OnceLock;

use common::config::ThresholdConfig;
use regex::Regex;

use super::metrics::{MetricsSnapshot, Series};
use crate::error::{LoadgenError, LoadgenResult};

/// Metrics a threshold can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Fraction of requests with no response or a status outside 200-399
    HttpReqFailed,
    /// Request latency in milliseconds
    HttpReqDuration,
}

impl Metric {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "http_req_failed" => Some(Metric::HttpReqFailed),
            "http_req_duration" => Some(Metric::HttpReqDuration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Rate,
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparison {
    fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
        }
    }
}

/// One parsed condition on one metric selection
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    /// `key:value` tag filter, `None` for the whole run
    pub tag: Option<String>,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
    source: String,
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn metric_regex() -> &'static Regex {
    static METRIC_REGEX: OnceLock<Regex> = OnceLock::new();
    METRIC_REGEX.get_or_init(|| {
        Regex::new(r"^(?P<metric>[a-z_]+)(?:\{(?P<tag>[^{}:]+:[^{}]+)\})?$")
            .expect("Failed to compile metric regex")
    })
}

fn condition_regex() -> &'static Regex {
    static CONDITION_REGEX: OnceLock<Regex> = OnceLock::new();
    CONDITION_REGEX.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<agg>rate|avg|min|max|med|p\(\s*(?P<p>\d+(?:\.\d+)?)\s*\))\s*(?P<op><=|>=|==|<|>)\s*(?P<bound>-?\d+(?:\.\d+)?)\s*$",
        )
        .expect("Failed to compile condition regex")
    })
}

impl Threshold {
    /// Parse a metric key and one of its conditions
    pub fn parse(metric_key: &str, condition: &str) -> LoadgenResult<Self> {
        let key = metric_regex()
            .captures(metric_key.trim())
            .ok_or_else(|| LoadgenError::Threshold(format!("invalid metric key '{metric_key}'")))?;
        let metric = Metric::parse(&key["metric"])
            .ok_or_else(|| LoadgenError::Threshold(format!("unknown metric '{}'", &key["metric"])))?;
        let tag = key.name("tag").map(|m| m.as_str().to_string());

        let invalid = || LoadgenError::Threshold(format!("invalid condition '{condition}'"));
        let cond = condition_regex().captures(condition).ok_or_else(invalid)?;

        let aggregation = match &cond["agg"] {
            "rate" => Aggregation::Rate,
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "med" => Aggregation::Med,
            _ => {
                let p: f64 = cond["p"].parse().map_err(|_| invalid())?;
                if p > 100.0 {
                    return Err(invalid());
                }
                Aggregation::Percentile(p)
            }
        };

        match (metric, aggregation) {
            (Metric::HttpReqFailed, Aggregation::Rate) => {}
            (Metric::HttpReqDuration, agg) if agg != Aggregation::Rate => {}
            _ => {
                return Err(LoadgenError::Threshold(format!(
                    "'{}' does not apply to {metric_key}",
                    &cond["agg"]
                )));
            }
        }

        let comparison = match &cond["op"] {
            "<" => Comparison::Lt,
            "<=" => Comparison::Le,
            ">" => Comparison::Gt,
            ">=" => Comparison::Ge,
            _ => Comparison::Eq,
        };
        let bound: f64 = cond["bound"].parse().map_err(|_| invalid())?;

        Ok(Self {
            metric,
            tag,
            aggregation,
            comparison,
            bound,
            source: format!("{}: {}", metric_key.trim(), condition.trim()),
        })
    }

    /// Parse every configured condition
    pub fn from_config(configs: &[ThresholdConfig]) -> LoadgenResult<Vec<Self>> {
        configs
            .iter()
            .flat_map(|config| {
                config
                    .conditions
                    .iter()
                    .map(move |condition| Self::parse(&config.metric, condition))
            })
            .collect()
    }

    fn observe(&self, series: &Series) -> Option<f64> {
        match self.aggregation {
            Aggregation::Rate => series.failure_rate(),
            Aggregation::Avg => series.avg(),
            Aggregation::Min => series.min(),
            Aggregation::Max => series.max(),
            Aggregation::Med => series.med(),
            Aggregation::Percentile(p) => series.percentile(p),
        }
    }

    /// Evaluate against a metrics snapshot
    ///
    /// A selection without samples passes, with no observed value.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdResult {
        let series = snapshot.series(self.tag.as_deref());
        let observed = self.observe(&series);
        let passed = observed.is_none_or(|value| self.comparison.holds(value, self.bound));

        ThresholdResult {
            threshold: self.to_string(),
            observed,
            passed,
        }
    }
}

/// Verdict for one threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdResult {
    pub threshold: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

/// Verdicts for every threshold of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdReport {
    pub results: Vec<ThresholdResult>,
}

impl ThresholdReport {
    pub fn evaluate(thresholds: &[Threshold], snapshot: &MetricsSnapshot) -> Self {
        Self {
            results: thresholds.iter().map(|t| t.evaluate(snapshot)).collect(),
        }
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(|result| result.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.results.iter().filter(|result| !result.passed)
    }
}
