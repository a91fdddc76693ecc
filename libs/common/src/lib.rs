//! Common library for the expense and payment load generator
//!
//! This crate provides the request payloads posted to the target service,
//! the run configuration surface (scenarios, thresholds, target) and the
//! shared error types.

pub mod config;
pub mod error;
pub mod records;

/// Example usage of the configuration module
///
/// ```rust,no_run
/// use common::config::RunConfig;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = RunConfig::from_env()?;
///     config.validate()?;
///     for scenario in &config.scenarios {
///         println!("{} -> {}", scenario.name, scenario.exec.as_str());
///     }
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
