//! Check command implementation.

use anyhow::{Context, Result};
use arch_graph_core::RuleBox;
use arch_graph_rules::rules_from_config;

use crate::config_resolver::ConfigSource;
use crate::{ImportArgs, OutputFormat};

/// Runs the check command.
pub fn run(
    args: &ImportArgs,
    format: OutputFormat,
    rules_filter: Option<String>,
    source: &ConfigSource,
) -> Result<()> {
    let (config, rules_config) = super::load_config(source)?;
    let fail_on = config.fail_threshold();

    let mut rules = rules_from_config(&rules_config).context("Invalid rule configuration")?;
    if let Some(filter) = rules_filter {
        let names: Vec<&str> = filter.split(',').map(str::trim).collect();
        rules = filter_rules(rules, &names);
    }
    if rules.is_empty() {
        tracing::warn!("No rules configured; run `arch-graph init` to create a config");
    }

    let mut builder = super::analyzer_builder(args, config);
    for rule in rules {
        builder = builder.rule_box(rule);
    }
    let analyzer = builder.build().context("Failed to build analyzer")?;

    tracing::info!(
        "Checking {:?} with {} rules",
        analyzer.classpath(),
        analyzer.rule_count()
    );

    let result = analyzer.analyze().context("Analysis failed")?;
    for diagnostic in &result.import_diagnostics {
        tracing::warn!("{diagnostic}");
    }

    super::output::print(&result, format)?;

    if result.has_violations_at(fail_on) {
        std::process::exit(1);
    }

    Ok(())
}

/// Keeps the rules whose name or code is listed.
fn filter_rules(rules: Vec<RuleBox>, names: &[&str]) -> Vec<RuleBox> {
    for name in names {
        let known = arch_graph_rules::all_rules()
            .iter()
            .any(|r| r.name == *name || r.code == *name);
        if !known {
            tracing::warn!("Unknown rule: {}", name);
        } else if !rules.iter().any(|r| r.name() == *name || r.code() == *name) {
            tracing::warn!("Rule {} is not configured", name);
        }
    }

    rules
        .into_iter()
        .filter(|r| names.contains(&r.name()) || names.contains(&r.code()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch_graph_rules::RulesConfig;

    fn configured() -> Vec<RuleBox> {
        let config = RulesConfig::parse(
            r#"
[[deny-package-dep]]
from = "..domain.."
to = ["java.sql.."]

[[cycles]]
slices = "com.example.(*).."
"#,
        )
        .unwrap();
        rules_from_config(&config).unwrap()
    }

    #[test]
    fn filters_by_name_or_code() {
        let kept = filter_rules(configured(), &["CYCLE001"]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name(), "package-cycle");

        let kept = filter_rules(configured(), &["deny-package-dep", "CYCLE001"]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn unknown_or_unconfigured_rules_are_dropped() {
        assert!(filter_rules(configured(), &["no-such-rule", "LAYER001"]).is_empty());
    }
}
