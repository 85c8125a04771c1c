//! Configuration types for arch-graph.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::importer::ImportOptions;
use crate::types::Severity;

/// Top-level configuration, read once before an import starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Severity threshold for failing a check (default: "error").
    #[serde(default)]
    pub fail_on: Option<Severity>,

    /// Import configuration.
    #[serde(default)]
    pub import: ImportConfig,

    /// Per-rule configurations.
    #[serde(default)]
    pub rules: HashMap<String, RuleConfig>,
}

impl Config {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// Unknown top-level tables (rule definitions such as `[[layers]]`) are
    /// ignored here and read by the rules crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Checks if a rule is enabled.
    #[must_use]
    pub fn is_rule_enabled(&self, rule_name: &str) -> bool {
        self.rules
            .get(rule_name)
            .map_or(true, |c| c.enabled.unwrap_or(true))
    }

    /// Gets the severity override for a rule.
    #[must_use]
    pub fn rule_severity(&self, rule_name: &str) -> Option<Severity> {
        self.rules.get(rule_name).and_then(|c| c.severity)
    }

    /// Threshold at which a check fails.
    #[must_use]
    pub fn fail_threshold(&self) -> Severity {
        self.fail_on.unwrap_or(Severity::Error)
    }
}

/// The `[import]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Locations to import: class directories, jars or class files.
    #[serde(default)]
    pub classpath: Vec<PathBuf>,

    /// Search path for classes pulled in to complete the graph.
    #[serde(default)]
    pub dependencies: Vec<PathBuf>,

    /// Glob patterns for artifact paths to skip.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Compute content checksums.
    #[serde(default = "default_true")]
    pub checksums: bool,

    /// Pull missing supertypes and access owners in from `dependencies`.
    #[serde(default = "default_true")]
    pub resolve_missing_dependencies: bool,

    /// Number of read workers (default: one per core).
    #[serde(default)]
    pub parallelism: Option<usize>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            classpath: Vec::new(),
            dependencies: Vec::new(),
            exclude: Vec::new(),
            checksums: true,
            resolve_missing_dependencies: true,
            parallelism: None,
        }
    }
}

impl ImportConfig {
    /// Importer options described by this table.
    #[must_use]
    pub fn options(&self) -> ImportOptions {
        ImportOptions {
            checksums: self.checksums,
            resolve_missing_dependencies: self.resolve_missing_dependencies,
            parallelism: self.parallelism,
            exclude: self.exclude.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Per-rule configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Whether this rule is enabled.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Severity override for this rule.
    #[serde(default)]
    pub severity: Option<Severity>,

    /// Rule-specific options as key-value pairs.
    #[serde(flatten)]
    pub options: HashMap<String, toml::Value>,
}

impl RuleConfig {
    /// Gets an option value as a specific type.
    #[must_use]
    pub fn get_option<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.options
            .get(key)
            .and_then(|v| v.clone().try_into().ok())
    }

    /// Gets a boolean option with a default value.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.options
            .get(key)
            .and_then(toml::Value::as_bool)
            .unwrap_or(default)
    }

    /// Gets a string array option.
    #[must_use]
    pub fn get_str_array(&self, key: &str) -> Vec<String> {
        self.options
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_checksums_and_resolution() {
        let config = Config::default();
        assert!(config.import.checksums);
        assert!(config.import.resolve_missing_dependencies);
        assert_eq!(config.fail_threshold(), Severity::Error);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn parses_import_and_rule_tables() {
        let toml = r#"
fail_on = "warning"

[import]
classpath = ["build/classes"]
dependencies = ["lib/dep.jar"]
exclude = ["**/generated/**"]
checksums = false
parallelism = 4

[rules.layer-dependency]
enabled = true
severity = "info"
include_stubs = true

[[layers]]
name = "web"
packages = ["..web.."]
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.fail_threshold(), Severity::Warning);
        assert_eq!(config.import.classpath, vec![PathBuf::from("build/classes")]);
        assert!(!config.import.checksums);
        assert!(config.import.resolve_missing_dependencies);

        let options = config.import.options();
        assert_eq!(options.parallelism, Some(4));
        assert_eq!(options.exclude, vec!["**/generated/**".to_string()]);

        assert!(config.is_rule_enabled("layer-dependency"));
        assert!(config.is_rule_enabled("package-cycle"));
        assert_eq!(config.rule_severity("layer-dependency"), Some(Severity::Info));
        let rule = &config.rules["layer-dependency"];
        assert!(rule.get_bool("include_stubs", false));
    }

    #[test]
    fn disabled_rule() {
        let config = Config::parse("[rules.package-cycle]\nenabled = false\n").unwrap();
        assert!(!config.is_rule_enabled("package-cycle"));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = Config::parse("fail_on = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
