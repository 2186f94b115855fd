//! Logging bootstrap for Hermes.
//!
//! Library crates in this workspace only emit `tracing` events. Binaries
//! call [`init_logging`] once at startup to install a subscriber:
//!
//! ```rust,no_run
//! use hermes_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(url = "ws://localhost:8080", "connecting");
//! # Ok::<(), hermes_telemetry::TelemetryError>(())
//! ```

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
