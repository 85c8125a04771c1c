//! # arch-graph-rules
//!
//! Declarative architecture rules evaluated over a [`DomainGraph`].
//!
//! ## Available Rules
//!
//! | Code | Name | Description |
//! |------|------|-------------|
//! | LAYER001 | `layer-dependency` | Restricts dependencies between `[[layers]]` to `[dependencies]` |
//! | PKG001 | `deny-package-dep` | Forbids dependencies between package patterns |
//! | CYCLE001 | `package-cycle` | Detects dependency cycles between package slices |
//!
//! ## Usage
//!
//! ```no_run
//! use arch_graph_core::Analyzer;
//! use arch_graph_rules::{rules_from_config, RulesConfig};
//!
//! let rules = RulesConfig::from_file("arch-graph.toml".as_ref())?;
//! let mut builder = Analyzer::builder().classpath("build/classes");
//! for rule in rules_from_config(&rules)? {
//!     builder = builder.rule_box(rule);
//! }
//! let result = builder.build()?.analyze()?;
//! result.print_report();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod deny_package_dep;
mod layer;
mod layer_dependency;
mod package_cycle;

pub use config::{ConfigError, CycleDef, DenyPackageDepDef, LayerDef, RulesConfig};
pub use deny_package_dep::DenyPackageDep;
pub use layer::LayerResolver;
pub use layer_dependency::LayerDependency;
pub use package_cycle::PackageCycle;

/// Re-export core types for convenience.
pub use arch_graph_core::{ArchRule, DomainGraph, RuleBox, Severity, Violation};

use arch_graph_core::{JavaClass, Location};
use tracing::debug;

/// Code, name and description of a built-in rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleInfo {
    /// Rule code (e.g., "LAYER001").
    pub code: &'static str,
    /// Rule name (e.g., "layer-dependency").
    pub name: &'static str,
    /// What the rule checks.
    pub description: &'static str,
    /// Configuration table that defines it.
    pub table: &'static str,
}

/// Every built-in rule, whether configured or not.
#[must_use]
pub fn all_rules() -> &'static [RuleInfo] {
    &[
        RuleInfo {
            code: layer_dependency::CODE,
            name: layer_dependency::NAME,
            description: "Restricts dependencies between layers to the configured ones",
            table: "[[layers]] + [dependencies]",
        },
        RuleInfo {
            code: deny_package_dep::CODE,
            name: deny_package_dep::NAME,
            description: "Forbids dependencies from one set of packages to another",
            table: "[[deny-package-dep]]",
        },
        RuleInfo {
            code: package_cycle::CODE,
            name: package_cycle::NAME,
            description: "Detects dependency cycles between package slices",
            table: "[[cycles]]",
        },
    ]
}

/// Builds the rules defined in `config`, skipping sections that are empty.
///
/// # Errors
///
/// Returns the first validation error of the configuration.
pub fn rules_from_config(config: &RulesConfig) -> Result<Vec<RuleBox>, ConfigError> {
    config.validate()?;

    let mut rules: Vec<RuleBox> = Vec::new();
    if !config.layers.is_empty() {
        rules.push(Box::new(LayerDependency::new(config)?));
    }
    if !config.deny_package_deps.is_empty() {
        rules.push(Box::new(DenyPackageDep::new(&config.deny_package_deps)?));
    }
    if !config.cycles.is_empty() {
        rules.push(Box::new(PackageCycle::new(&config.cycles)?));
    }
    debug!("{} rule(s) configured", rules.len());
    Ok(rules)
}

/// Location of a dependency raised by `class`.
pub(crate) fn location_of(class: &JavaClass, line: Option<u32>) -> Location {
    Location::class(class.name())
        .with_source_file(class.source().and_then(|s| s.file_name()))
        .with_line(line)
}
