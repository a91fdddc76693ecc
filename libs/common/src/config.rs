//! Run configuration for the load generator
//!
//! The configuration is assembled once at startup and passed explicitly to
//! the harness. Sources are layered with the `config` crate:
//!
//! 1. built-in defaults (the baseline expense/payment run)
//! 2. an optional file named by `LOADGEN_CONFIG` (TOML, YAML or JSON)
//! 3. environment overrides prefixed `LOADGEN__`, e.g. `LOADGEN__TARGET__BASE_URL`

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use ::config::{Config, Environment, File};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::records::{ExpenseTemplate, PaymentTemplate};

/// Tag key every scenario groups its metrics under
pub const SCENARIO_TAG: &str = "test_type";

/// Target service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL of the service under test (e.g., "http://localhost:8083")
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Status code the response check expects
    pub expected_status: u16,
    /// Readiness endpoint polled before the run
    pub health_path: String,
    /// How long to wait for readiness; 0 skips the probe
    pub health_timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8083".to_string(),
            timeout_ms: 60_000,
            expected_status: 200,
            health_path: "/health".to_string(),
            health_timeout_secs: 30,
        }
    }
}

impl TargetConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Join the base URL with an absolute path, tolerating a trailing slash
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Named entry point a scenario executes on every iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScenarioExec {
    AddExpense,
    AddPayments,
}

impl ScenarioExec {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioExec::AddExpense => "addExpense",
            ScenarioExec::AddPayments => "addPayments",
        }
    }
}

/// Constant-arrival-rate scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub exec: ScenarioExec,
    /// Iterations started per `time_unit`
    pub rate: u64,
    pub time_unit: String,
    pub duration: String,
    /// Workers available when the scenario starts
    pub pre_allocated_vus: usize,
    /// Upper bound the worker pool may grow to
    pub max_vus: usize,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ScenarioConfig {
    fn constant(name: &str, exec: ScenarioExec, test_type: &str) -> Self {
        Self {
            name: name.to_string(),
            exec,
            rate: 10_000,
            time_unit: "1m".to_string(),
            duration: "1m".to_string(),
            pre_allocated_vus: 2,
            max_vus: 25,
            tags: BTreeMap::from([(SCENARIO_TAG.to_string(), test_type.to_string())]),
        }
    }

    pub fn time_unit(&self) -> ConfigResult<Duration> {
        parse_duration(&self.time_unit)
    }

    pub fn duration(&self) -> ConfigResult<Duration> {
        parse_duration(&self.duration)
    }

    /// Metric grouping tag as `key:value`, falling back to the exec name
    pub fn metric_tag(&self) -> String {
        match self.tags.get(SCENARIO_TAG) {
            Some(value) => format!("{SCENARIO_TAG}:{value}"),
            None => format!("{SCENARIO_TAG}:{}", self.exec.as_str()),
        }
    }

    /// Every `key:value` tag a sample of this scenario is recorded under
    ///
    /// Run tags come first and scenario tags override them. The result is
    /// sorted by key.
    pub fn metric_tags(&self, run_tags: &BTreeMap<String, String>) -> Vec<String> {
        let mut merged = run_tags.clone();
        merged.extend(self.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
            .entry(SCENARIO_TAG.to_string())
            .or_insert_with(|| self.exec.as_str().to_string());

        merged
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect()
    }
}

/// Pass/fail conditions over one metric, e.g. `http_req_duration{test_type:addExpense}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub metric: String,
    pub conditions: Vec<String>,
}

impl ThresholdConfig {
    fn new(metric: &str, condition: &str) -> Self {
        Self {
            metric: metric.to_string(),
            conditions: vec![condition.to_string()],
        }
    }
}

/// Payload values used for every request of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadConfig {
    pub expense: ExpenseTemplate,
    pub payment: PaymentTemplate,
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub target: TargetConfig,
    /// Tags attached to the whole run
    pub tags: BTreeMap<String, String>,
    pub scenarios: Vec<ScenarioConfig>,
    pub thresholds: Vec<ThresholdConfig>,
    pub payload: PayloadConfig,
}

/// Identifier grouping the metrics of one run, e.g. `api-Load-Testing-2024-05-01T10:00:00.000Z`
fn default_run_id() -> String {
    format!(
        "api-Load-Testing-{}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            tags: BTreeMap::from([
                ("test".to_string(), "api-performance".to_string()),
                ("test_run_id".to_string(), default_run_id()),
            ]),
            scenarios: vec![
                ScenarioConfig::constant(
                    "addExpense_constant",
                    ScenarioExec::AddExpense,
                    "addExpense",
                ),
                ScenarioConfig::constant(
                    "addPayments_constant",
                    ScenarioExec::AddPayments,
                    "addPayments",
                ),
            ],
            thresholds: vec![
                ThresholdConfig::new("http_req_failed{test_type:addExpense}", "rate<0.01"),
                ThresholdConfig::new("http_req_duration{test_type:addExpense}", "p(95)<200"),
                ThresholdConfig::new("http_req_failed{test_type:addPayments}", "rate<0.01"),
                ThresholdConfig::new("http_req_duration{test_type:addPayments}", "p(95)<200"),
            ],
            payload: PayloadConfig::default(),
        }
    }
}

impl RunConfig {
    /// Create a new RunConfig from the environment
    ///
    /// # Environment Variables
    /// - `LOADGEN_CONFIG`: optional path to a configuration file
    /// - `LOADGEN__<SECTION>__<KEY>`: overrides a single value
    pub fn from_env() -> ConfigResult<Self> {
        let path = env::var("LOADGEN_CONFIG").ok();
        Self::load(path.as_deref())
    }

    /// Layer an optional file and `LOADGEN__` variables over the defaults
    pub fn load(path: Option<&str>) -> ConfigResult<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading run configuration from {}", path);
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("LOADGEN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: RunConfig = settings.try_deserialize()?;
        config
            .tags
            .entry("test_run_id".to_string())
            .or_insert_with(default_run_id);
        Ok(config)
    }

    /// Reject configurations the harness cannot run
    pub fn validate(&self) -> ConfigResult<()> {
        let base_url = &self.target.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "target.base_url must be an http(s) URL, got '{base_url}'"
            )));
        }

        if self.scenarios.is_empty() {
            return Err(ConfigError::Invalid("no scenarios configured".to_string()));
        }

        for scenario in &self.scenarios {
            let name = &scenario.name;
            if scenario.rate == 0 {
                return Err(ConfigError::Invalid(format!("{name}: rate must be positive")));
            }
            if scenario.time_unit()?.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "{name}: time_unit must be positive"
                )));
            }
            if scenario.duration()?.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "{name}: duration must be positive"
                )));
            }
            if scenario.max_vus == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name}: max_vus must be positive"
                )));
            }
            if scenario.max_vus < scenario.pre_allocated_vus {
                return Err(ConfigError::Invalid(format!(
                    "{name}: max_vus ({}) is below pre_allocated_vus ({})",
                    scenario.max_vus, scenario.pre_allocated_vus
                )));
            }
        }

        Ok(())
    }
}

/// Parse the `1h2m3s500ms` shorthand used for time units and durations
pub fn parse_duration(input: &str) -> ConfigResult<Duration> {
    let invalid = || ConfigError::InvalidDuration(input.to_string());
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let secs_per_unit = match &rest[..unit_len] {
            "ms" => None,
            "s" => Some(1),
            "m" => Some(60),
            "h" => Some(3600),
            _ => return Err(invalid()),
        };
        let part = match secs_per_unit {
            None => Duration::from_millis(value),
            Some(factor) => Duration::from_secs(value.checked_mul(factor).ok_or_else(invalid)?),
        };
        total = total.checked_add(part).ok_or_else(invalid)?;
        rest = &rest[unit_len..];
    }

    Ok(total)
}
