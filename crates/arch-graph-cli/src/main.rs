//! arch-graph CLI tool.
//!
//! Usage:
//! ```bash
//! arch-graph check [OPTIONS] [PATHS]...
//! arch-graph classes [OPTIONS] [PATHS]...
//! arch-graph list-rules
//! arch-graph init
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Architecture rules for compiled JVM classes
#[derive(Parser)]
#[command(name = "arch-graph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "ARCH_GRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Locations shared by the commands that import classes.
#[derive(clap::Args, Debug, Clone)]
pub struct ImportArgs {
    /// Class directories, jars or class files (default: `[import].classpath`)
    pub paths: Vec<PathBuf>,

    /// Classpath entries searched for missing supertypes and access owners
    #[arg(short, long)]
    pub dependency: Vec<PathBuf>,

    /// Exclude patterns (can be specified multiple times)
    #[arg(short, long)]
    pub exclude: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import classes and check the configured rules
    Check {
        #[command(flatten)]
        import: ImportArgs,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Only run specific rules (comma-separated names or codes)
        #[arg(long)]
        rules: Option<String>,
    },

    /// Import classes and list them
    Classes {
        #[command(flatten)]
        import: ImportArgs,

        /// Only list classes in packages matching this pattern (e.g. `..domain..`)
        #[arg(short, long)]
        package: Option<String>,

        /// Also list stubs and pulled-in classes
        #[arg(long)]
        all: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List available rules
    ListRules,

    /// Initialize configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

/// Output format for results.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One-line-per-entry compact format.
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check {
            import,
            format,
            rules,
        } => {
            let source = config_resolver::resolve(&std::env::current_dir()?, cli.config.as_deref());
            commands::check::run(&import, format, rules, &source)
        }
        Commands::Classes {
            import,
            package,
            all,
            format,
        } => {
            let source = config_resolver::resolve(&std::env::current_dir()?, cli.config.as_deref());
            commands::classes::run(&import, package.as_deref(), all, format, &source)
        }
        Commands::ListRules => {
            commands::list_rules::run();
            Ok(())
        }
        Commands::Init { force } => commands::init::run(force),
    }
}
