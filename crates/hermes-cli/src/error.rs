//! Error types for the command-line client.

use hermes_client::WsError;
use hermes_telemetry::TelemetryError;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors raised while preparing a CLI session.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration file could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Client configuration or connection error.
    #[error(transparent)]
    Client(#[from] WsError),

    /// Logging configuration error.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
