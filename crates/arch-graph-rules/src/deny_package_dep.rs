//! Rule forbidding dependencies between package patterns.
//!
//! ```toml
//! [[deny-package-dep]]
//! from = "..domain.."
//! to = ["java.sql..", "..infrastructure.."]
//! message = "The domain must stay persistence-agnostic"
//! ```

use std::collections::HashSet;

use arch_graph_core::predicate::PackageMatcher;
use arch_graph_core::{ArchRule, DomainGraph, Severity, Violation};

use crate::config::{compile, ConfigError, DenyPackageDepDef};
use crate::location_of;

/// Rule code for deny-package-dep.
pub const CODE: &str = "PKG001";

/// Rule name for deny-package-dep.
pub const NAME: &str = "deny-package-dep";

#[derive(Debug, Clone)]
struct Entry {
    from: PackageMatcher,
    to: Vec<PackageMatcher>,
    message: Option<String>,
    severity: Option<Severity>,
}

/// Reports dependencies from classes in `from` packages to classes in
/// any of the `to` packages.
#[derive(Debug, Clone)]
pub struct DenyPackageDep {
    entries: Vec<Entry>,
}

impl DenyPackageDep {
    /// Compiles the `[[deny-package-dep]]` entries.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid.
    pub fn new(defs: &[DenyPackageDepDef]) -> Result<Self, ConfigError> {
        let entries = defs
            .iter()
            .enumerate()
            .map(|(i, def)| {
                Ok(Entry {
                    from: compile(&def.from, || format!("deny-package-dep[{i}].from"))?,
                    to: def
                        .to
                        .iter()
                        .map(|p| compile(p, || format!("deny-package-dep[{i}].to")))
                        .collect::<Result<_, _>>()?,
                    message: def.message.clone(),
                    severity: def.severity,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { entries })
    }
}

impl ArchRule for DenyPackageDep {
    fn name(&self) -> &'static str {
        NAME
    }

    fn code(&self) -> &'static str {
        CODE
    }

    fn description(&self) -> &'static str {
        "Forbids dependencies from one set of packages to another"
    }

    fn check(&self, graph: &DomainGraph) -> Vec<Violation> {
        let mut violations = Vec::new();

        for entry in &self.entries {
            for class in graph.imported_classes() {
                if !entry.from.matches(class.package()) {
                    continue;
                }
                let mut reported = HashSet::new();
                for dependency in graph.dependencies_from(class.id()) {
                    let target = graph.get(dependency.target);
                    let Some(denied) = entry.to.iter().find(|m| m.matches(target.package())) else {
                        continue;
                    };
                    if !reported.insert(target.id()) {
                        continue;
                    }
                    let message = entry.message.clone().unwrap_or_else(|| {
                        format!(
                            "{} {} {}, but '{}' must not depend on '{denied}'",
                            class.name(),
                            dependency.kind,
                            target.name(),
                            entry.from,
                        )
                    });
                    violations.push(Violation::new(
                        CODE,
                        NAME,
                        entry.severity.unwrap_or_else(|| self.default_severity()),
                        location_of(class, dependency.line),
                        message,
                    ));
                }
            }
        }

        violations
    }
}
