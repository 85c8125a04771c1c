//! Orchestrates an import followed by rule evaluation.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::graph::DomainGraph;
use crate::importer::{ClassFileImporter, ImportError, ImportResult};
use crate::resolver::ClasspathResolver;
use crate::rule::{ArchRule, RuleBox};
use crate::types::{LintResult, Violation};

/// Errors that can occur during analysis.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The import failed as a whole.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Nothing to import.
    #[error("No classpath configured: pass locations or set [import].classpath")]
    NoClasspath,
}

/// Builder for configuring an [`Analyzer`].
#[derive(Default)]
pub struct AnalyzerBuilder {
    classpath: Vec<PathBuf>,
    dependencies: Vec<PathBuf>,
    rules: Vec<RuleBox>,
    exclude_patterns: Vec<String>,
    config: Option<Config>,
}

impl AnalyzerBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a location to import.
    #[must_use]
    pub fn classpath(mut self, path: impl Into<PathBuf>) -> Self {
        self.classpath.push(path.into());
        self
    }

    /// Adds a location searched for classes outside the import set.
    #[must_use]
    pub fn dependency(mut self, path: impl Into<PathBuf>) -> Self {
        self.dependencies.push(path.into());
        self
    }

    /// Adds a rule.
    #[must_use]
    pub fn rule<R: ArchRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Adds a boxed rule.
    #[must_use]
    pub fn rule_box(mut self, rule: RuleBox) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds an exclude glob pattern.
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the analyzer. Locations given to the builder come before the
    /// configured ones.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::NoClasspath`] if no location is known.
    pub fn build(self) -> Result<Analyzer, AnalyzerError> {
        let config = self.config.unwrap_or_default();

        let mut classpath = self.classpath;
        classpath.extend(config.import.classpath.iter().cloned());
        if classpath.is_empty() {
            return Err(AnalyzerError::NoClasspath);
        }

        let mut dependencies = self.dependencies;
        dependencies.extend(config.import.dependencies.iter().cloned());

        let mut options = config.import.options();
        options.exclude.extend(self.exclude_patterns);

        let importer = ClassFileImporter::new()
            .options(options)
            .resolver(ClasspathResolver::new(dependencies));

        Ok(Analyzer {
            classpath,
            importer,
            rules: self.rules,
            config,
        })
    }
}

/// Imports the configured classpath and checks it against the rules.
///
/// Use [`Analyzer::builder()`] to construct an instance.
pub struct Analyzer {
    classpath: Vec<PathBuf>,
    importer: ClassFileImporter,
    rules: Vec<RuleBox>,
    config: Config,
}

impl Analyzer {
    /// Creates a new builder for configuring an analyzer.
    #[must_use]
    pub fn builder() -> AnalyzerBuilder {
        AnalyzerBuilder::new()
    }

    /// Locations that will be imported.
    #[must_use]
    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    /// Returns the number of registered rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Imports the classpath without running any rule.
    ///
    /// # Errors
    ///
    /// Returns an error if a location cannot be enumerated.
    pub fn import(&self) -> Result<ImportResult, AnalyzerError> {
        Ok(self.importer.import_paths(self.classpath.iter().cloned())?)
    }

    /// Imports the classpath and runs every enabled rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the import fails as a whole.
    pub fn analyze(&self) -> Result<LintResult, AnalyzerError> {
        info!("Starting analysis of {} location(s)", self.classpath.len());
        let ImportResult { graph, diagnostics } = self.import()?;

        let mut result = self.check(&graph);
        result.import_diagnostics = diagnostics;
        Ok(result)
    }

    /// Runs every enabled rule against an already imported graph.
    #[must_use]
    pub fn check(&self, graph: &DomainGraph) -> LintResult {
        let mut result = LintResult::new();
        result.classes_checked = graph.imported_classes().count();

        for rule in &self.rules {
            if !self.config.is_rule_enabled(rule.name()) {
                debug!("Skipping disabled rule: {}", rule.name());
                continue;
            }
            let violations = rule.check(graph);
            debug!("{}: {} violation(s)", rule.name(), violations.len());
            result
                .violations
                .extend(self.apply_severity_override(rule.name(), violations));
        }

        result
            .violations
            .sort_by(|a, b| a.location.cmp(&b.location).then(a.code.cmp(&b.code)));

        info!(
            "Analysis complete: {} violations in {} classes",
            result.violations.len(),
            result.classes_checked
        );
        result
    }

    /// Applies severity overrides from configuration.
    fn apply_severity_override(
        &self,
        rule_name: &str,
        mut violations: Vec<Violation>,
    ) -> Vec<Violation> {
        if let Some(severity) = self.config.rule_severity(rule_name) {
            for v in &mut violations {
                v.severity = severity;
            }
        }
        violations
    }
}
