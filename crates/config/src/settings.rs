// Store settings
// Loaded from ~/.config/ledgercache/store.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Two years and one month of history survive pruning by default.
pub const DEFAULT_RETENTION_MONTHS: u32 = 25;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Backing document file.
    pub document: PathBuf,
    /// Schema file. `None` = schema built into the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// History + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// History reads drop records dated on or before the first day of the
    /// month this many months ago.
    #[serde(default = "default_retention_months")]
    pub retention_months: u32,
}

fn default_retention_months() -> u32 {
    DEFAULT_RETENTION_MONTHS
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_months: DEFAULT_RETENTION_MONTHS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl StoreConfig {
    /// Config for a document with every other setting at its default.
    pub fn for_document(document: impl Into<PathBuf>) -> Self {
        Self {
            document: document.into(),
            schema: None,
            history: HistoryConfig::default(),
            output: OutputConfig::default(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.document.as_os_str().is_empty() {
            return Err(ConfigError::Validation("document path is empty".into()));
        }
        if self.history.retention_months == 0 {
            return Err(ConfigError::Validation(
                "history.retention_months must be at least 1".into(),
            ));
        }
        if let Some(schema) = &self.schema {
            if schema.as_os_str().is_empty() {
                return Err(ConfigError::Validation("schema path is empty".into()));
            }
        }
        Ok(())
    }

    /// Relative paths are taken relative to `base`.
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        if self.document.is_relative() {
            self.document = base.join(&self.document);
        }
        if let Some(schema) = self.schema.take() {
            self.schema = Some(if schema.is_relative() { base.join(schema) } else { schema });
        }
        self
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ledgercache")
            .join("store.toml")
    }

    /// Read and validate a config file. Relative paths inside it are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        log::debug!("loaded store config from {}", path.display());
        Ok(config.resolve_relative_to(base))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
