//! TOML definitions for the declarative rules.
//!
//! Lives in the same file as the core configuration and adds
//! `[[layers]]`, `[dependencies]`, `[[deny-package-dep]]` and `[[cycles]]`.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use arch_graph_core::predicate::{PackageMatcher, PredicateError};
use arch_graph_core::Severity;

/// Rule definitions of one configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfig {
    /// Layer definitions.
    #[serde(default)]
    pub layers: Vec<LayerDef>,

    /// Dependency rules: layer name -> layers it may depend on.
    #[serde(default)]
    pub dependencies: HashMap<String, Vec<String>>,

    /// Forbidden package dependencies.
    #[serde(rename = "deny-package-dep", default)]
    pub deny_package_deps: Vec<DenyPackageDepDef>,

    /// Slice definitions checked for cycles.
    #[serde(default)]
    pub cycles: Vec<CycleDef>,
}

/// A named architecture layer.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerDef {
    /// Layer name (e.g., `"domain"`).
    pub name: String,
    /// Package patterns belonging to this layer (e.g., `"com.example.domain.."`).
    pub packages: Vec<String>,
}

/// Packages matching `from` must not depend on packages matching `to`.
#[derive(Debug, Clone, Deserialize)]
pub struct DenyPackageDepDef {
    /// Origin package pattern.
    pub from: String,
    /// Forbidden target package patterns.
    pub to: Vec<String>,
    /// Message reported instead of the generated one.
    #[serde(default)]
    pub message: Option<String>,
    /// Severity for violations of this entry.
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// Slices that must not depend on each other cyclically.
#[derive(Debug, Clone, Deserialize)]
pub struct CycleDef {
    /// Package pattern with exactly one capture group naming the slice,
    /// e.g. `"com.example.(*).."`.
    pub slices: String,
}

/// Errors when loading rule definitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// IO error.
        source: std::io::Error,
    },
    /// Failed to parse TOML.
    #[error("invalid config: {message}")]
    Parse {
        /// Parse error detail.
        message: String,
    },
    /// Config is structurally invalid.
    #[error("config validation: {0}")]
    Validation(String),
    /// A package pattern does not compile.
    #[error("{context}: {source}")]
    Pattern {
        /// Where the pattern was found.
        context: String,
        /// Why it is invalid.
        source: PredicateError,
    },
}

impl RulesConfig {
    /// Load from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parse from a TOML string. Tables that belong to the core
    /// configuration are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Whether no rule is defined at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.deny_package_deps.is_empty() && self.cycles.is_empty()
    }

    /// Validate config consistency.
    ///
    /// # Errors
    ///
    /// Returns error describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut layer_names = HashSet::new();
        for layer in &self.layers {
            if !layer_names.insert(layer.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "layer '{}' is defined twice",
                    layer.name
                )));
            }
            if layer.packages.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "layer '{}' has no packages",
                    layer.name
                )));
            }
            for package in &layer.packages {
                compile(package, || format!("layers.{}", layer.name))?;
            }
        }

        for (layer, deps) in &self.dependencies {
            if !layer_names.contains(layer.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "dependencies.{layer}: unknown layer"
                )));
            }
            for dep in deps {
                if !layer_names.contains(dep.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "dependencies.{layer}: unknown dep '{dep}'"
                    )));
                }
            }
            if deps.contains(layer) {
                return Err(ConfigError::Validation(format!(
                    "dependencies.{layer}: self-dependency"
                )));
            }
        }

        for l in &self.layers {
            if !self.dependencies.contains_key(&l.name) {
                return Err(ConfigError::Validation(format!(
                    "layer '{}' has no entry in [dependencies]",
                    l.name
                )));
            }
        }

        for (i, deny) in self.deny_package_deps.iter().enumerate() {
            compile(&deny.from, || format!("deny-package-dep[{i}].from"))?;
            if deny.to.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "deny-package-dep[{i}]: 'to' is empty"
                )));
            }
            for to in &deny.to {
                compile(to, || format!("deny-package-dep[{i}].to"))?;
            }
        }

        for (i, cycle) in self.cycles.iter().enumerate() {
            let matcher = compile(&cycle.slices, || format!("cycles[{i}].slices"))?;
            if matcher.capture_count() != 1 {
                return Err(ConfigError::Validation(format!(
                    "cycles[{i}]: '{}' must contain exactly one capture group",
                    cycle.slices
                )));
            }
        }

        Ok(())
    }
}

/// Compiles a pattern, naming where it came from on failure.
pub(crate) fn compile(
    pattern: &str,
    context: impl FnOnce() -> String,
) -> Result<PackageMatcher, ConfigError> {
    PackageMatcher::new(pattern).map_err(|source| ConfigError::Pattern {
        context: context(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYERS: &str = r#"
[[layers]]
name = "domain"
packages = ["com.example.domain.."]

[[layers]]
name = "app"
packages = ["com.example.app.."]

[dependencies]
domain = []
app = ["domain"]
"#;

    #[test]
    fn parse_full_config() {
        let toml = format!(
            r#"
fail_on = "warning"

[import]
classpath = ["build/classes"]

{LAYERS}

[[deny-package-dep]]
from = "..domain.."
to = ["java.sql..", "javax.persistence.."]
severity = "warning"

[[cycles]]
slices = "com.example.(*).."
"#
        );
        let config = RulesConfig::parse(&toml).expect("parse failed");
        assert_eq!(config.layers.len(), 2);
        assert_eq!(config.deny_package_deps.len(), 1);
        assert_eq!(config.deny_package_deps[0].severity, Some(Severity::Warning));
        assert_eq!(config.cycles[0].slices, "com.example.(*)..");
        assert!(config.validate().is_ok());
        assert!(!config.is_empty());
    }

    #[test]
    fn core_only_config_has_no_rules() {
        let config = RulesConfig::parse("[import]\nclasspath = [\"x\"]\n").unwrap();
        assert!(config.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_catches_unknown_layer_in_deps() {
        let toml = r#"
[[layers]]
name = "domain"
packages = ["com.example.domain.."]

[dependencies]
domain = ["nonexistent"]
"#;
        let err = RulesConfig::parse(toml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn validate_catches_missing_dep_entry() {
        let toml = r#"
[[layers]]
name = "domain"
packages = ["com.example.domain.."]

[[layers]]
name = "app"
packages = ["com.example.app.."]

[dependencies]
domain = []
"#;
        let err = RulesConfig::parse(toml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("app"));
    }

    #[test]
    fn validate_catches_self_dependency() {
        let toml = r#"
[[layers]]
name = "domain"
packages = ["com.example.domain.."]

[dependencies]
domain = ["domain"]
"#;
        assert!(RulesConfig::parse(toml).unwrap().validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_patterns() {
        let toml = r#"
[[deny-package-dep]]
from = "com...domain"
to = ["java.sql.."]
"#;
        let err = RulesConfig::parse(toml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
        assert!(err.to_string().starts_with("deny-package-dep[0].from"));

        let toml = "[[deny-package-dep]]\nfrom = \"..domain..\"\nto = []\n";
        let err = RulesConfig::parse(toml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn cycle_slices_need_one_capture() {
        let err = RulesConfig::parse("[[cycles]]\nslices = \"com.example..\"\n")
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("exactly one capture group"));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = RulesConfig::from_file(Path::new("/no/such/arch-graph.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
