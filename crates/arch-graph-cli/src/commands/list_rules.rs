//! List rules command implementation.

use arch_graph_rules::all_rules;

/// Runs the list-rules command.
pub fn run() {
    println!("Available rules:\n");
    println!("{:<10} {:<20} {:<30} Description", "Code", "Name", "Config");
    println!("{}", "-".repeat(100));

    for rule in all_rules() {
        println!(
            "{:<10} {:<20} {:<30} {}",
            rule.code, rule.name, rule.table, rule.description
        );
    }

    println!("\nRules run when their table is present in arch-graph.toml.");
    println!("\nUse --rules to filter specific rules, e.g.:");
    println!("  arch-graph check --rules layer-dependency,package-cycle");
    println!("  arch-graph check --rules LAYER001,PKG001");
}
