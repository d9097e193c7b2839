//! Logging for the agentool tool runtime.
//!
//! Installs a `tracing` subscriber with an [`EnvFilter`](tracing_subscriber::EnvFilter),
//! a choice of output formats, and either stderr or a rolling log file as the
//! target. Stdout is never used, so it stays free for tool results.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentool_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), agentool_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("agentool::tool_stderr=debug");
//! setup_logging(&config)?;
//! tracing::info!("ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{FileRotation, LogConfig, LogFormat, LogTarget, setup_logging};
