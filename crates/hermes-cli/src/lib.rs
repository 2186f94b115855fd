//! Command-line WebSocket client for Hermes.
//!
//! The `hermes` binary connects to a WebSocket server, prints every inbound
//! message on its own line and sends each line read from standard input as
//! a text message. End of input sends a Close frame.

pub mod config;
pub mod error;
pub mod printer;

pub use config::CliConfig;
pub use error::{CliError, CliResult};
pub use printer::MessagePrinter;

/// Hermes CLI version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
