//! Init command implementation.

use anyhow::{bail, Result};
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# arch-graph configuration

# Fail the check at this severity or above: "error", "warning" or "info"
fail_on = "error"

[import]
# Class directories, jars or class files to check
classpath = ["build/classes/java/main"]

# Searched for supertypes and access owners outside the classpath
# dependencies = ["libs/framework.jar"]

# Glob patterns to exclude from the import
exclude = [
    "**/generated/**",
]

# checksums = true
# resolve_missing_dependencies = true
# parallelism = 4

# Layers: packages use `..` for any number of packages and `*` for one
[[layers]]
name = "web"
packages = ["com.example..web.."]

[[layers]]
name = "service"
packages = ["com.example..service.."]

[[layers]]
name = "domain"
packages = ["com.example..domain.."]

# Allowed dependencies between layers
[dependencies]
web = ["service", "domain"]
service = ["domain"]
domain = []

# Forbidden package dependencies
[[deny-package-dep]]
from = "com.example..domain.."
to = ["java.sql..", "javax.persistence.."]
message = "The domain must not depend on persistence APIs"

# Cycles between slices named by the single `(*)` capture
[[cycles]]
slices = "com.example.(*).."

# Rule overrides
# [rules.package-cycle]
# severity = "warning"
# enabled = true
"#;

/// Runs the init command.
pub fn run(force: bool) -> Result<()> {
    let config_path = Path::new("arch-graph.toml");

    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(config_path, DEFAULT_CONFIG)?;

    println!("Created arch-graph.toml");
    println!("\nNext steps:");
    println!("  1. Point [import].classpath at your compiled classes");
    println!("  2. Edit the layers and rules to match your packages");
    println!("  3. Run: arch-graph check");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch_graph_core::{Config, Severity};
    use arch_graph_rules::{rules_from_config, RulesConfig};

    #[test]
    fn default_config_is_valid() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.fail_threshold(), Severity::Error);
        assert_eq!(config.import.classpath.len(), 1);

        let rules = RulesConfig::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(rules_from_config(&rules).unwrap().len(), 3);
    }
}
