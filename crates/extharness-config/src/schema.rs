//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub run: RunConfig,

    /// Cases to run. Empty means every registered case with its defaults.
    #[serde(default)]
    pub cases: Vec<CaseConfig>,
}

impl HarnessConfig {
    pub fn case(&self, name: &str) -> Option<&CaseConfig> {
        self.cases.iter().find(|case| case.name == name)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Directory for daily rolling log files. Console only when unset.
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Run policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Upper bound on one case's run, in seconds. Unbounded when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Stop after the first failing case.
    #[serde(default)]
    pub fail_fast: bool,
}

/// One test case entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConfig {
    pub name: String,

    /// Addon hosted as the extension under test. Falls back to the case's
    /// built-in default when unset.
    #[serde(default)]
    pub addon: Option<String>,

    /// Properties handed to the addon.
    #[serde(default)]
    pub properties: toml::Table,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl CaseConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addon: None,
            properties: toml::Table::new(),
            enabled: true,
        }
    }

    /// The property table as a JSON object document.
    pub fn properties_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(&self.properties)?)
    }
}
