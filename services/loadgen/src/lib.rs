//! Expense and payment load generator
//!
//! Posts expense and payment records to a target service at a constant
//! arrival rate, checks every response status and evaluates latency and
//! error-rate thresholds at the end of the run.

pub mod check;
pub mod error;
pub mod generator;
pub mod harness;
pub mod health;
pub mod scenarios;

pub use check::{Check, CheckOutcome, CheckTally};
pub use error::{LoadgenError, LoadgenResult};
pub use generator::{RequestGenerator, Submission};
pub use scenarios::{Sample, Scenarios};
