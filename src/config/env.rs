//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

#![allow(dead_code)]

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "RUN_PARALLEL";

/// Configuration read from `RUN_PARALLEL_*` variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// Jobs from RUN_PARALLEL_JOBS
    pub jobs: Option<i64>,
    /// Test directory from RUN_PARALLEL_DIR
    pub test_dir: Option<String>,
    /// Shell from RUN_PARALLEL_SHELL
    pub shell: Option<String>,
    /// Report format from RUN_PARALLEL_FORMAT
    pub format: Option<String>,
    /// Log level from RUN_PARALLEL_LOG
    pub log_level: Option<String>,
    /// Config file from RUN_PARALLEL_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from the process environment
    pub fn load() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a full variable name
    /// to its value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}")).filter(|v| !v.trim().is_empty())
        };

        Self {
            jobs: get("JOBS").and_then(|v| v.trim().parse().ok()),
            test_dir: get("DIR"),
            shell: get("SHELL"),
            format: get("FORMAT"),
            log_level: get("LOG"),
            config_file: get("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.jobs.is_some()
            || self.test_dir.is_some()
            || self.shell.is_some()
            || self.format.is_some()
            || self.log_level.is_some()
            || self.config_file.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_JOBS:    {:?}", ENV_PREFIX, self.jobs);
        println!("  {}_DIR:     {:?}", ENV_PREFIX, self.test_dir);
        println!("  {}_SHELL:   {:?}", ENV_PREFIX, self.shell);
        println!("  {}_FORMAT:  {:?}", ENV_PREFIX, self.format);
        println!("  {}_LOG:     {:?}", ENV_PREFIX, self.log_level);
        println!("  {}_CONFIG:  {:?}", ENV_PREFIX, self.config_file);
    }
}

/// Print all RUN_PARALLEL environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_JOBS     Parallel jobs (0 = one per CPU)");
    println!("  {ENV_PREFIX}_DIR      Directory containing tNNNN-*.sh scripts");
    println!("  {ENV_PREFIX}_SHELL    Interpreter for test scripts");
    println!("  {ENV_PREFIX}_FORMAT   Report format (table, json, json-pretty, csv, summary)");
    println!("  {ENV_PREFIX}_LOG      Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_CONFIG   Path to configuration file");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.jobs.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_from_lookup() {
        let config = EnvConfig::from_lookup(lookup(&[
            ("RUN_PARALLEL_JOBS", " 12 "),
            ("RUN_PARALLEL_FORMAT", "csv"),
            ("RUN_PARALLEL_SHELL", ""),
            ("OTHER_JOBS", "3"),
        ]));

        assert_eq!(config.jobs, Some(12));
        assert_eq!(config.format, Some("csv".to_string()));
        assert_eq!(config.shell, None);
        assert!(config.has_any());
    }

    #[test]
    fn test_invalid_jobs_ignored() {
        let config = EnvConfig::from_lookup(lookup(&[("RUN_PARALLEL_JOBS", "many")]));
        assert_eq!(config.jobs, None);
    }
}
