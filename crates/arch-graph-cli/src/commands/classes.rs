//! Classes command: imports the classpath and lists what was found.

use anyhow::{Context, Result};
use arch_graph_core::predicate::resides_in_package;
use arch_graph_core::{ClassPredicate, ImportDiagnostic, JavaClass};
use serde::Serialize;

use crate::config_resolver::ConfigSource;
use crate::{ImportArgs, OutputFormat};

/// How a class entered the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Origin {
    Imported,
    PulledIn,
    Stub,
}

#[derive(Debug, Serialize)]
struct ClassRow<'a> {
    name: &'a str,
    kind: String,
    origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    dependencies: usize,
}

#[derive(Debug, Serialize)]
struct Listing<'a> {
    classes: Vec<ClassRow<'a>>,
    diagnostics: &'a [ImportDiagnostic],
}

fn origin_of(class: &JavaClass) -> Origin {
    if class.is_stub() {
        Origin::Stub
    } else if class.is_pulled_in() {
        Origin::PulledIn
    } else {
        Origin::Imported
    }
}

/// Runs the classes command.
pub fn run(
    args: &ImportArgs,
    package: Option<&str>,
    all: bool,
    format: OutputFormat,
    source: &ConfigSource,
) -> Result<()> {
    let (config, _) = super::load_config(source)?;
    let analyzer = super::analyzer_builder(args, config)
        .build()
        .context("Failed to build analyzer")?;
    let package = package
        .map(resides_in_package)
        .transpose()
        .context("Invalid package pattern")?;

    let result = analyzer.import().context("Import failed")?;
    let graph = &result.graph;

    let classes: Vec<ClassRow<'_>> = graph
        .classes()
        .filter(|c| !c.is_array())
        .filter(|c| all || origin_of(c) == Origin::Imported)
        .filter(|c| package.as_ref().map_or(true, |p| p.test(c, graph)))
        .map(|c| ClassRow {
            name: c.name(),
            kind: c.kind().to_string(),
            origin: origin_of(c),
            source: c.source().map(|s| s.uri()),
            dependencies: graph.dependencies_from(c.id()).count(),
        })
        .collect();

    let listing = Listing {
        classes,
        diagnostics: &result.diagnostics,
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
        OutputFormat::Compact => {
            for row in &listing.classes {
                println!("{}", row.name);
            }
        }
        OutputFormat::Text => print_text(&listing),
    }
    Ok(())
}

fn print_text(listing: &Listing<'_>) {
    for row in &listing.classes {
        let origin = match row.origin {
            Origin::Imported => "",
            Origin::PulledIn => " \x1b[34m(pulled in)\x1b[0m",
            Origin::Stub => " \x1b[33m(stub)\x1b[0m",
        };
        println!(
            "{:<10} {}{origin}  {} dependencies",
            row.kind, row.name, row.dependencies
        );
        if let Some(source) = row.source {
            println!("           {source}");
        }
    }
    for diagnostic in listing.diagnostics {
        println!("\x1b[33mimport\x1b[0m {diagnostic}");
    }
    println!("\n{} class(es)", listing.classes.len());
}
