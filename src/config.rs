//! Configuration
//!
//! Layered the usual way:
//! - Built-in defaults
//! - Optional TOML config file
//! - Environment variable overrides
//! - Validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const LOG_FORMATS: &[&str] = &["pretty", "json"];
const LOG_OUTPUTS: &[&str] = &["console", "file", "both"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Claude Code home; transcripts live under `<claude_home>/projects`
    pub claude_home: PathBuf,
    pub log_directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Relative to the project root
    pub tracking_dir: PathBuf,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "WARN".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            claude_home: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".claude"),
            log_directory: PathBuf::from("logs"),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            tracking_dir: PathBuf::from(".claude").join("tracking"),
            file_name: "tokens.json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, the first config file found, and environment
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            PathBuf::from("token-ledger.toml"),
            PathBuf::from(".token-ledger.toml"),
            dirs::config_dir()
                .map(|d| d.join("token-ledger").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in config_paths.iter().filter(|p| !p.as_os_str().is_empty()) {
            if path.exists() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        if let Ok(val) = env::var("CLAUDE_HOME") {
            self.paths.claude_home = PathBuf::from(val);
        }
        if let Ok(val) = env::var("TOKEN_LEDGER_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        if let Ok(val) = env::var("TOKEN_LEDGER_TRACKING_DIR") {
            self.ledger.tracking_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("TOKEN_LEDGER_FILE") {
            self.ledger.file_name = val;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Log format must be one of {:?}, got {:?}",
                LOG_FORMATS,
                self.logging.format
            );
        }

        if !LOG_OUTPUTS.contains(&self.logging.output.as_str()) {
            anyhow::bail!(
                "Log output must be one of {:?}, got {:?}",
                LOG_OUTPUTS,
                self.logging.output
            );
        }

        let file_name = &self.ledger.file_name;
        if file_name.is_empty() {
            anyhow::bail!("Ledger file name cannot be empty");
        }
        if file_name.contains('/') || file_name.contains(std::path::MAIN_SEPARATOR) {
            anyhow::bail!("Ledger file name must not contain a path separator: {}", file_name);
        }

        Ok(())
    }

    /// Ledger location for a project root
    pub fn ledger_path(&self, project_root: &Path) -> PathBuf {
        project_root
            .join(&self.ledger.tracking_dir)
            .join(&self.ledger.file_name)
    }
}
