//! Configuration module
//!
//! Settings come from, in increasing priority: built-in defaults, the
//! configuration file, `RUN_PARALLEL_*` environment variables and finally
//! command-line flags.

mod env;

pub use env::{print_env_help, EnvConfig};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Parallel jobs; zero or less means one per CPU
    pub jobs: i64,

    /// Directory scanned for test scripts
    pub test_dir: PathBuf,

    /// Interpreter used to run test scripts
    pub shell: String,

    /// Report format (table, json, json-pretty, csv, summary)
    pub format: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            test_dir: PathBuf::from("."),
            shell: "sh".to_string(),
            format: "table".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("run-parallel").join("config.yaml"))
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        Ok(config)
    }

    /// Load an explicit file, else the default file if present, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                debug!("Loading config from {}", path.display());
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create '{}'", parent.display()))?;
        }
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Overlay values set in the environment
    pub fn merge_env(mut self, env: &EnvConfig) -> Self {
        if let Some(jobs) = env.jobs {
            self.jobs = jobs;
        }
        if let Some(ref dir) = env.test_dir {
            self.test_dir = PathBuf::from(dir);
        }
        if let Some(ref shell) = env.shell {
            self.shell = shell.clone();
        }
        if let Some(ref format) = env.format {
            self.format = format.clone();
        }
        if let Some(ref level) = env.log_level {
            self.log_level = level.clone();
        }
        self
    }
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
