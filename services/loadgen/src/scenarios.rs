//! Scenario entry points invoked once per iteration
//!
//! `addExpense` and `addPayments` each build a fresh record, submit it,
//! check the response status and tally the result. A failed check never
//! aborts or retries the iteration.

use std::time::Duration;

use common::config::{PayloadConfig, RunConfig, ScenarioExec};
use tracing::debug;

use crate::check::{Check, CheckOutcome, CheckTally};
use crate::error::LoadgenResult;
use crate::generator::{RequestGenerator, Submission};

/// What one iteration observed
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub exec: ScenarioExec,
    pub status: Option<u16>,
    pub latency: Duration,
    pub passed: bool,
}

/// The two entry points plus everything they share
#[derive(Debug, Clone)]
pub struct Scenarios {
    generator: RequestGenerator,
    payload: PayloadConfig,
    check: Check,
    tally: CheckTally,
}

impl Scenarios {
    pub fn new(generator: RequestGenerator, payload: PayloadConfig, check: Check) -> Self {
        Self {
            generator,
            payload,
            check,
            tally: CheckTally::new(),
        }
    }

    pub fn from_config(config: &RunConfig) -> LoadgenResult<Self> {
        let generator = RequestGenerator::new(&config.target)?;
        let check = Check::status_is(config.target.expected_status);
        Ok(Self::new(generator, config.payload.clone(), check))
    }

    pub fn generator(&self) -> &RequestGenerator {
        &self.generator
    }

    pub fn check(&self) -> &Check {
        &self.check
    }

    pub fn tally(&self) -> &CheckTally {
        &self.tally
    }

    /// Dispatch to the named entry point
    pub async fn run(&self, exec: ScenarioExec) -> Sample {
        match exec {
            ScenarioExec::AddExpense => self.add_expense().await,
            ScenarioExec::AddPayments => self.add_payments().await,
        }
    }

    /// Submit one expense stamped with the current time
    pub async fn add_expense(&self) -> Sample {
        let expense = self.payload.expense.stamp();
        let submission = self.generator.submit_expense(&expense).await;
        self.conclude(ScenarioExec::AddExpense, submission).await
    }

    /// Submit one payment stamped with the current time
    pub async fn add_payments(&self) -> Sample {
        let payment = self.payload.payment.stamp();
        let submission = self.generator.submit_payment(&payment).await;
        self.conclude(ScenarioExec::AddPayments, submission).await
    }

    async fn conclude(&self, exec: ScenarioExec, submission: Submission) -> Sample {
        let outcome = self.check.evaluate(&submission);
        self.tally.record(self.check.name(), &outcome).await;

        if let CheckOutcome::Failed(reason) = &outcome {
            debug!(
                scenario = exec.as_str(),
                status = ?submission.status,
                "Check '{}' failed: {}",
                self.check.name(),
                reason
            );
        }

        Sample {
            exec,
            status: submission.status,
            latency: submission.latency,
            passed: outcome.passed(),
        }
    }
}
