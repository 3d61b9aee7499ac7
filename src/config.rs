//! # Invoker Configuration
//!
//! Runtime switches for the dispatch engine, loaded from environment
//! variables or a YAML file.
//!
//! ## Environment Variables
//!
//! ### `DISPATCH_VALIDATION`
//!
//! `true`/`false`. When `false` no validator is looked up and targets are
//! never validated. Default: `true`.
//!
//! ### `DISPATCH_RECORD_STATS`
//!
//! `true`/`false`. When `false` per-method invocation counters are not
//! incremented. Default: `true`.
//!
//! ### `DISPATCH_LOG_VIOLATIONS`
//!
//! Maximum number of individual violations written to the log when a
//! validation fault is raised. Default: `8`.
//!
//! ## YAML
//!
//! ```yaml
//! validation: true
//! record_stats: false
//! log_violations: 4
//! ```
//!
//! Missing keys take their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    pub validation: bool,
    pub record_stats: bool,
    pub log_violations: usize,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            validation: true,
            record_stats: true,
            log_violations: 8,
        }
    }
}

impl InvokerConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparseable values fall back to defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            validation: lookup("DISPATCH_VALIDATION")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.validation),
            record_stats: lookup("DISPATCH_RECORD_STATS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.record_stats),
            log_violations: lookup("DISPATCH_LOG_VIOLATIONS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.log_violations),
        }
    }

    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Malformed YAML or wrongly typed values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse invoker config YAML")
    }

    /// Read and parse a YAML config file.
    ///
    /// # Errors
    ///
    /// Unreadable file or invalid contents.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read invoker config {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("Invalid invoker config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = InvokerConfig::default();
        assert!(config.validation);
        assert!(config.record_stats);
        assert_eq!(config.log_violations, 8);
    }

    #[test]
    fn test_from_lookup_overrides_and_fallbacks() {
        let vars: HashMap<&str, &str> = [
            ("DISPATCH_VALIDATION", "false"),
            ("DISPATCH_RECORD_STATS", "not-a-bool"),
            ("DISPATCH_LOG_VIOLATIONS", " 3 "),
        ]
        .into_iter()
        .collect();
        let config = InvokerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(!config.validation);
        assert!(config.record_stats);
        assert_eq!(config.log_violations, 3);
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = InvokerConfig::from_yaml_str("record_stats: false\n").unwrap();
        assert!(config.validation);
        assert!(!config.record_stats);
    }

    #[test]
    fn test_from_yaml_rejects_wrong_types() {
        assert!(InvokerConfig::from_yaml_str("validation: [1, 2]\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "validation: false\nlog_violations: 2").unwrap();
        let config = InvokerConfig::load(file.path()).unwrap();
        assert!(!config.validation);
        assert_eq!(config.log_violations, 2);
    }

    #[test]
    fn test_load_missing_file_mentions_path() {
        let err = InvokerConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
    }
}
