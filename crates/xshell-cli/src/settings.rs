//! Layered settings: defaults, TOML file, `XSHELL_*` environment variables

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{CliError, CliResult};
use crate::logging::parse_level;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "XSHELL";

/// Effective CLI settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default wait bound in milliseconds (0 = none)
    pub timeout_ms: u64,
    /// Merge stderr into stdout by default
    pub redirect_error_stream: bool,
    /// How long to wait for output to drain after exit
    pub drain_grace_ms: u64,
    /// Log level when neither --verbose nor --quiet is given
    pub log_level: String,
    /// Environment overlay applied to every run
    pub env: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            redirect_error_stream: false,
            drain_grace_ms: 1000,
            log_level: "warn".to_string(),
            env: HashMap::new(),
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("xshell")
            .join("config.toml")
    }

    /// Load settings
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> CliResult<()> {
        if parse_level(&self.log_level).is_none() {
            return Err(CliError::Config(format!(
                "unknown log level '{}' (expected trace, debug, info, warn or error)",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Configured log level
    pub fn level(&self) -> Level {
        parse_level(&self.log_level).unwrap_or(Level::WARN)
    }

    /// Drain grace as a duration
    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> CliResult<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))
    }
}
