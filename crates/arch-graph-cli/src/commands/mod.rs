//! Subcommand implementations.

pub mod check;
pub mod classes;
pub mod init;
pub mod list_rules;
pub mod output;

use anyhow::{Context, Result};
use arch_graph_core::{Analyzer, AnalyzerBuilder, Config};
use arch_graph_rules::RulesConfig;

use crate::config_resolver::ConfigSource;
use crate::ImportArgs;

/// Loads the import settings and rule definitions from the resolved source.
fn load_config(source: &ConfigSource) -> Result<(Config, RulesConfig)> {
    if let ConfigSource::Default = source {
        tracing::debug!("No config file found, using defaults");
        return Ok((Config::default(), RulesConfig::default()));
    }

    // Invariant: non-Default variants always have a path
    let path = source.path().context("resolved config has no path")?;
    if source.is_global() {
        tracing::info!("Using global config: {}", path.display());
    } else {
        tracing::debug!("Using config: {}", path.display());
    }
    let config = Config::from_file(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))?;
    let rules = RulesConfig::from_file(path)
        .with_context(|| format!("Failed to load rules: {}", path.display()))?;
    Ok((config, rules))
}

/// Starts an analyzer builder from the command line locations.
fn analyzer_builder(args: &ImportArgs, config: Config) -> AnalyzerBuilder {
    let mut builder = Analyzer::builder().config(config);
    for path in &args.paths {
        builder = builder.classpath(path);
    }
    for path in &args.dependency {
        builder = builder.dependency(path);
    }
    for pattern in &args.exclude {
        builder = builder.exclude(pattern);
    }
    builder
}
