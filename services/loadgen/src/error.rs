//! Custom error types for the load generator

use common::error::ConfigError;
use thiserror::Error;

/// Custom error type for the load generator
///
/// Individual request failures are not errors: they surface as failed checks.
#[derive(Error, Debug)]
pub enum LoadgenError {
    /// Run configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),

    /// A threshold expression could not be parsed
    #[error("Threshold error: {0}")]
    Threshold(String),

    /// The target never reported ready
    #[error("Target unavailable: {0}")]
    TargetUnavailable(String),
}

/// Type alias for load generator results
pub type LoadgenResult<T> = Result<T, LoadgenError>;
