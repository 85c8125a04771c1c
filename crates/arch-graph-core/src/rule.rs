//! The rule trait evaluated over a linked graph.

use crate::graph::DomainGraph;
use crate::types::{Severity, Violation};

/// An architecture rule checked against a whole [`DomainGraph`].
///
/// # Example
///
/// ```
/// use arch_graph_core::{ArchRule, DomainGraph, Location, Severity, Violation};
///
/// pub struct NoStubSuperclasses;
///
/// impl ArchRule for NoStubSuperclasses {
///     fn name(&self) -> &'static str { "no-stub-superclasses" }
///     fn code(&self) -> &'static str { "HIER001" }
///
///     fn check(&self, graph: &DomainGraph) -> Vec<Violation> {
///         graph
///             .imported_classes()
///             .filter(|c| c.superclass().is_some_and(|s| graph.get(s).is_stub()))
///             .map(|c| {
///                 Violation::new(
///                     self.code(),
///                     self.name(),
///                     self.default_severity(),
///                     Location::class(c.name()),
///                     "superclass is not on the classpath",
///                 )
///             })
///             .collect()
///     }
/// }
/// ```
pub trait ArchRule: Send + Sync {
    /// Returns the kebab-case name of this rule (e.g., "layer-dependency").
    fn name(&self) -> &'static str;

    /// Returns the rule code (e.g., "LAYER001").
    fn code(&self) -> &'static str;

    /// Returns a brief description of what this rule checks.
    fn description(&self) -> &'static str {
        ""
    }

    /// Returns the default severity for violations from this rule.
    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    /// Checks the graph and returns any violations found.
    fn check(&self, graph: &DomainGraph) -> Vec<Violation>;
}

/// Type alias for boxed rule trait objects.
pub type RuleBox = Box<dyn ArchRule>;
