//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while configuring logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configuration is invalid (bad filter directive, unusable log directory).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A global subscriber was already installed.
    #[error("initialization error: {0}")]
    InitError(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
