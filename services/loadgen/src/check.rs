//! Per-response status checks and their tallies

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::generator::Submission;

/// Result of evaluating a check against one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    /// Failed, with a human-readable reason
    Failed(String),
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, CheckOutcome::Passed)
    }
}

/// Assertion that a response carries one exact status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    name: String,
    expected_status: u16,
}

impl Check {
    /// Check named `is status <expected>`
    pub fn status_is(expected_status: u16) -> Self {
        Self {
            name: format!("is status {expected_status}"),
            expected_status,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the check; transport failures and other statuses both fail
    pub fn evaluate(&self, submission: &Submission) -> CheckOutcome {
        match submission.status {
            Some(status) if status == self.expected_status => CheckOutcome::Passed,
            Some(status) => CheckOutcome::Failed(format!(
                "expected status {}, got {}",
                self.expected_status, status
            )),
            None => CheckOutcome::Failed(format!(
                "no response: {}",
                submission.error.as_deref().unwrap_or("unknown error")
            )),
        }
    }
}

/// Pass/fail counts for one check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckCounts {
    pub passes: u64,
    pub fails: u64,
}

impl CheckCounts {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    /// Fraction of passing evaluations, 0 when nothing was evaluated
    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.passes as f64 / self.total() as f64
        }
    }
}

/// Check tallies shared by every worker of a run
#[derive(Debug, Clone, Default)]
pub struct CheckTally {
    counts: Arc<Mutex<HashMap<String, CheckCounts>>>,
}

impl CheckTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one evaluation of the named check
    pub async fn record(&self, name: &str, outcome: &CheckOutcome) {
        let mut counts = self.counts.lock().await;
        let entry = counts.entry(name.to_string()).or_default();
        if outcome.passed() {
            entry.passes += 1;
        } else {
            entry.fails += 1;
        }
    }

    /// Counts for one check
    pub async fn get(&self, name: &str) -> CheckCounts {
        self.counts
            .lock()
            .await
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    /// Copy of every tally, sorted by check name
    pub async fn snapshot(&self) -> Vec<(String, CheckCounts)> {
        let counts = self.counts.lock().await;
        let mut entries: Vec<_> = counts
            .iter()
            .map(|(name, counts)| (name.clone(), *counts))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
