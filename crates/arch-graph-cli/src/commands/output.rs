//! Shared output formatting for check results.

use anyhow::Result;
use arch_graph_core::{LintResult, Severity, ViolationDiagnostic};

use crate::OutputFormat;

/// Print check results in the specified format.
pub fn print(result: &LintResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print_text(result),
        OutputFormat::Json => return print_json(result),
        OutputFormat::Compact => print_compact(result),
    }
    Ok(())
}

fn print_text(result: &LintResult) {
    let (errors, warnings, _) = result.count_by_severity();

    for violation in &result.violations {
        let severity_indicator = match violation.severity {
            Severity::Error => "\x1b[31merror\x1b[0m",
            Severity::Warning => "\x1b[33mwarning\x1b[0m",
            Severity::Info => "\x1b[34minfo\x1b[0m",
        };
        println!("{} {}", severity_indicator, violation.rule);
        println!(
            "{:?}",
            miette::Report::new(ViolationDiagnostic::from(violation))
        );
    }

    for diagnostic in &result.import_diagnostics {
        println!("\x1b[33mimport\x1b[0m {diagnostic}");
    }
    if !result.import_diagnostics.is_empty() {
        println!();
    }

    let summary_color = if errors > 0 {
        "\x1b[31m"
    } else if warnings > 0 {
        "\x1b[33m"
    } else {
        "\x1b[32m"
    };
    println!("{summary_color}{}\x1b[0m", result.summary());
}

fn print_json(result: &LintResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{json}");
    Ok(())
}

fn print_compact(result: &LintResult) {
    for violation in &result.violations {
        println!("{violation}");
    }
    for diagnostic in &result.import_diagnostics {
        println!("{diagnostic}");
    }
}
