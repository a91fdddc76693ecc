//! Custom error types for the common library
//!
//! This module defines the errors raised while assembling and checking the
//! run configuration.

use ::config::ConfigError as SourceError;
use thiserror::Error;

/// Custom error type for configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration source could not be read or deserialized
    #[error("Configuration load error: {0}")]
    Load(#[from] SourceError),

    /// A duration string is not in the `1h2m3s500ms` shorthand
    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),

    /// The configuration was loaded but describes an impossible run
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Type alias for Result with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;
