//! Configuration for the command-line client.
//!
//! A config file has two optional sections:
//!
//! ```toml
//! [client]
//! url = "wss://echo.example.com/"
//! ping_interval = "30s"
//!
//! [logging]
//! level = "hermes_client=debug,info"
//! json_format = false
//! ```

use std::path::Path;

use hermes_client::ClientConfig;
use hermes_telemetry::{create_env_filter, LogConfig};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Complete CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Connection settings.
    pub client: ClientConfig,

    /// Logging settings.
    pub logging: LogConfig,
}

impl CliConfig {
    /// Load configuration from a `.toml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> CliResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("failed to read {}: {e}", path.display())))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "toml" => {
                toml::from_str(&content).map_err(|e| CliError::Config(format!("invalid TOML: {e}")))
            }
            "json" => serde_json::from_str(&content)
                .map_err(|e| CliError::Config(format!("invalid JSON: {e}"))),
            _ => Err(CliError::Config(format!(
                "unsupported config format: {extension}"
            ))),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Client variables are documented on
    /// [`ClientConfig::with_env_overrides`]. Logging adds `HERMES_LOG_LEVEL`
    /// and `HERMES_LOG_JSON`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.client = self.client.with_overrides(&lookup);

        if let Some(level) = lookup("HERMES_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(json) = lookup("HERMES_LOG_JSON").and_then(|v| v.parse().ok()) {
            self.logging.json_format = json;
        }

        self
    }

    /// Validate both sections.
    pub fn validate(&self) -> CliResult<()> {
        self.client.validate()?;
        create_env_filter(&self.logging.level)?;
        Ok(())
    }
}
