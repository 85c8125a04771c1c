//! Layer resolution: maps packages to architecture layers.

use arch_graph_core::predicate::PackageMatcher;

use crate::config::{compile, ConfigError, LayerDef};

/// Resolves package names to architecture layer names.
///
/// Layers are tried in declaration order; the first layer with a matching
/// package pattern wins.
#[derive(Debug, Clone)]
pub struct LayerResolver {
    layers: Vec<(String, Vec<PackageMatcher>)>,
}

impl LayerResolver {
    /// Build a resolver from layer definitions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] if a package pattern is invalid.
    pub fn new(layers: &[LayerDef]) -> Result<Self, ConfigError> {
        let layers = layers
            .iter()
            .map(|layer| {
                let matchers = layer
                    .packages
                    .iter()
                    .map(|p| compile(p, || format!("layers.{}", layer.name)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((layer.name.clone(), matchers))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { layers })
    }

    /// Which layer does this package belong to?
    #[must_use]
    pub fn resolve(&self, package: &str) -> Option<&str> {
        self.layers
            .iter()
            .find(|(_, matchers)| matchers.iter().any(|m| m.matches(package)))
            .map(|(name, _)| name.as_str())
    }

    /// Layer names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|(name, _)| name.as_str())
    }
}
