//! Rule detecting dependency cycles between package slices.
//!
//! A slice is the set of packages sharing the value of the single capture
//! group of a pattern: with `com.example.(*)..`, `com.example.order.web`
//! and `com.example.order.domain` both belong to slice `order`.
//!
//! Slice dependencies form a directed graph; every strongly connected
//! component with more than one slice is one cycle and is reported once.

use std::collections::BTreeMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use arch_graph_core::predicate::PackageMatcher;
use arch_graph_core::{ArchRule, Dependency, DomainGraph, Location, Severity, Violation};

use crate::config::{compile, ConfigError, CycleDef};
use crate::location_of;

/// Rule code for package-cycle.
pub const CODE: &str = "CYCLE001";

/// Rule name for package-cycle.
pub const NAME: &str = "package-cycle";

/// Maximum number of example edges listed per cycle.
const MAX_EXAMPLES: usize = 5;

/// Reports cycles between slices.
#[derive(Debug, Clone)]
pub struct PackageCycle {
    slices: Vec<PackageMatcher>,
}

/// Slice graph of one pattern with one example dependency per edge.
struct SliceGraph<'g> {
    graph: DiGraph<String, &'g Dependency>,
    nodes: BTreeMap<String, NodeIndex>,
}

impl<'g> SliceGraph<'g> {
    fn build(matcher: &PackageMatcher, domain: &'g DomainGraph) -> Self {
        let mut slices = Self {
            graph: DiGraph::new(),
            nodes: BTreeMap::new(),
        };
        let slice_of = |package: &str| {
            matcher
                .captures(package)
                .and_then(|c| c.into_iter().next())
                .filter(|s| !s.is_empty())
        };

        for class in domain.imported_classes() {
            let Some(from) = slice_of(class.package()) else {
                continue;
            };
            for dependency in domain.dependencies_from(class.id()) {
                let Some(to) = slice_of(domain.get(dependency.target).package()) else {
                    continue;
                };
                if from == to {
                    continue;
                }
                let a = slices.node(&from);
                let b = slices.node(&to);
                if slices.graph.find_edge(a, b).is_none() {
                    slices.graph.add_edge(a, b, dependency);
                }
            }
        }
        slices
    }

    fn node(&mut self, slice: &str) -> NodeIndex {
        if let Some(index) = self.nodes.get(slice) {
            return *index;
        }
        let index = self.graph.add_node(slice.to_string());
        self.nodes.insert(slice.to_string(), index);
        index
    }

    /// Cycles as sorted slice lists, in slice name order.
    fn cycles(&self) -> Vec<Vec<NodeIndex>> {
        let mut cycles: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|mut scc| {
                scc.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
                scc
            })
            .collect();
        cycles.sort_by(|a, b| self.graph[a[0]].cmp(&self.graph[b[0]]));
        cycles
    }

    /// Example dependencies along the edges inside `cycle`, sorted by slices.
    fn edges_within(&self, cycle: &[NodeIndex]) -> Vec<(&str, &str, &'g Dependency)> {
        let mut edges = Vec::new();
        for &a in cycle {
            for &b in cycle {
                if let Some(edge) = self.graph.find_edge(a, b) {
                    edges.push((
                        self.graph[a].as_str(),
                        self.graph[b].as_str(),
                        self.graph[edge],
                    ));
                }
            }
        }
        edges
    }
}

impl PackageCycle {
    /// Compiles the `[[cycles]]` slice patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid or does not have exactly
    /// one capture group.
    pub fn new(defs: &[CycleDef]) -> Result<Self, ConfigError> {
        let slices = defs
            .iter()
            .enumerate()
            .map(|(i, def)| {
                let matcher = compile(&def.slices, || format!("cycles[{i}].slices"))?;
                if matcher.capture_count() != 1 {
                    return Err(ConfigError::Validation(format!(
                        "cycles[{i}]: '{}' must contain exactly one capture group",
                        def.slices
                    )));
                }
                Ok(matcher)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { slices })
    }

    fn report(
        &self,
        matcher: &PackageMatcher,
        slices: &SliceGraph<'_>,
        cycle: &[NodeIndex],
        domain: &DomainGraph,
    ) -> Violation {
        let names: Vec<&str> = cycle.iter().map(|n| slices.graph[*n].as_str()).collect();
        let edges = slices.edges_within(cycle);

        let location = edges.first().map_or_else(
            || Location::class(names[0]),
            |(_, _, dependency)| location_of(domain.get(dependency.origin), dependency.line),
        );
        let examples: Vec<String> = edges
            .iter()
            .take(MAX_EXAMPLES)
            .map(|(from, to, d)| {
                format!(
                    "{from} -> {to}: {} {} {}",
                    domain.get(d.origin).name(),
                    d.kind,
                    domain.get(d.target).name()
                )
            })
            .collect();

        Violation::new(
            CODE,
            NAME,
            self.default_severity(),
            location,
            format!(
                "Slices of '{matcher}' form a dependency cycle: {}",
                names.join(", ")
            ),
        )
        .with_suggestion(examples.join("; "))
    }
}

impl ArchRule for PackageCycle {
    fn name(&self) -> &'static str {
        NAME
    }

    fn code(&self) -> &'static str {
        CODE
    }

    fn description(&self) -> &'static str {
        "Detects dependency cycles between package slices"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, graph: &DomainGraph) -> Vec<Violation> {
        let mut violations = Vec::new();
        for matcher in &self.slices {
            let slices = SliceGraph::build(matcher, graph);
            let cycles = slices.cycles();
            debug!(
                "{matcher}: {} slices, {} cycles",
                slices.nodes.len(),
                cycles.len()
            );
            violations.extend(
                cycles
                    .iter()
                    .map(|cycle| self.report(matcher, &slices, cycle, graph)),
            );
        }
        violations
    }
}
