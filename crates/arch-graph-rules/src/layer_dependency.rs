//! Rule enforcing the allowed dependencies between layers.
//!
//! # Configuration
//!
//! ```toml
//! [[layers]]
//! name = "web"
//! packages = ["com.example.web.."]
//!
//! [[layers]]
//! name = "domain"
//! packages = ["com.example.domain.."]
//!
//! [dependencies]
//! web = ["domain"]
//! domain = []
//! ```
//!
//! Every class dependency from one layer to another layer that is not
//! listed under `[dependencies]` is reported once per target class.
//! Classes outside every layer are ignored on both ends.

use std::collections::{HashMap, HashSet};

use arch_graph_core::{ArchRule, DomainGraph, Violation};

use crate::config::{ConfigError, RulesConfig};
use crate::layer::LayerResolver;
use crate::location_of;

/// Rule code for layer-dependency.
pub const CODE: &str = "LAYER001";

/// Rule name for layer-dependency.
pub const NAME: &str = "layer-dependency";

/// Checks class dependencies against the layer dependency table.
#[derive(Debug, Clone)]
pub struct LayerDependency {
    resolver: LayerResolver,
    allowed: HashMap<String, Vec<String>>,
}

impl LayerDependency {
    /// Builds the rule from the `[[layers]]` and `[dependencies]` tables.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer package pattern is invalid.
    pub fn new(config: &RulesConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            resolver: LayerResolver::new(&config.layers)?,
            allowed: config.dependencies.clone(),
        })
    }

    fn is_allowed(&self, from: &str, to: &str) -> bool {
        from == to
            || self
                .allowed
                .get(from)
                .is_some_and(|targets| targets.iter().any(|t| t == to))
    }
}

impl ArchRule for LayerDependency {
    fn name(&self) -> &'static str {
        NAME
    }

    fn code(&self) -> &'static str {
        CODE
    }

    fn description(&self) -> &'static str {
        "Restricts dependencies between layers to the configured ones"
    }

    fn check(&self, graph: &DomainGraph) -> Vec<Violation> {
        let mut violations = Vec::new();

        for class in graph.imported_classes() {
            let Some(from_layer) = self.resolver.resolve(class.package()) else {
                continue;
            };

            let mut reported = HashSet::new();
            for dependency in graph.dependencies_from(class.id()) {
                let target = graph.get(dependency.target);
                let Some(to_layer) = self.resolver.resolve(target.package()) else {
                    continue;
                };
                if self.is_allowed(from_layer, to_layer) || !reported.insert(target.id()) {
                    continue;
                }

                let allowed = self
                    .allowed
                    .get(from_layer)
                    .filter(|targets| !targets.is_empty())
                    .map_or_else(|| "none".to_string(), |targets| targets.join(", "));
                violations.push(
                    Violation::new(
                        CODE,
                        NAME,
                        self.default_severity(),
                        location_of(class, dependency.line),
                        format!(
                            "{from_layer} -> {to_layer} dependency not allowed: {} {} {}",
                            class.name(),
                            dependency.kind,
                            target.name()
                        ),
                    )
                    .with_suggestion(format!("layer '{from_layer}' may depend on: {allowed}")),
                );
            }
        }

        violations
    }
}
