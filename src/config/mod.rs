//! `/etc/rhc/config.toml` and command-line overrides.
pub mod toml_loader;

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::systemd::UnitNames;
use crate::telemetry;

/// Default location of the configuration file.
pub const DEFAULT_PATH: &str = "/etc/rhc/config.toml";

/// Default directory for the preference document and connected marker.
pub const DEFAULT_STATE_DIR: &str = "/var/lib/rhc";

/// Telemetry client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Path of the telemetry client executable.
    pub program: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            program: telemetry::DEFAULT_PROGRAM.to_string(),
        }
    }
}

/// Loaded configuration. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Log level for the file log (`error`..`trace`).
    pub log_level: Option<String>,
    /// Where local state lives.
    pub state_dir: PathBuf,
    /// Override for the log directory.
    pub log_dir: Option<PathBuf>,
    /// Telemetry client settings.
    pub telemetry: TelemetryConfig,
    /// Remote management unit names.
    pub units: UnitNames,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            log_dir: None,
            telemetry: TelemetryConfig::default(),
            units: UnitNames::default(),
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml_loader::load_config(path)?;
        if let Some(level) = &config.log_level
            && level.parse::<tracing::Level>().is_err()
        {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: format!("invalid log-level '{level}'"),
            });
        }
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply a `--log-level` given on the command line.
    #[must_use]
    pub fn with_log_level(mut self, level: Option<String>) -> Self {
        if level.is_some() {
            self.log_level = level;
        }
        self
    }

    /// Effective log level, `info` when unset.
    #[must_use]
    pub fn level(&self) -> tracing::Level {
        self.log_level
            .as_deref()
            .and_then(|l| l.parse().ok())
            .unwrap_or(tracing::Level::INFO)
    }
}
