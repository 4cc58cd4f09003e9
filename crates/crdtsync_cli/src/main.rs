//! crdtsync CLI
//!
//! Command-line tools for crdtsync stores.
//!
//! # Commands
//!
//! - `inspect` - Display the scopes and documents of a store
//! - `reset` - Drop every scope and reseed main
//! - `demo` - Run two sessions through a commit and a pull
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// crdtsync command-line store tools.
#[derive(Parser)]
#[command(name = "crdtsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the scopes and documents of a store
    Inspect {
        /// List every record, not just counts
        #[arg(short, long)]
        records: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Drop every scope and reseed main with the built-in entity types
    Reset {
        /// Skip the confirmation check
        #[arg(short, long)]
        yes: bool,
    },

    /// Run two sessions through a commit and a pull
    ///
    /// Uses the store at --path if given, an in-memory store otherwise.
    Demo {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { records, format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, records, format)?;
        }
        Commands::Reset { yes } => {
            let path = cli.path.ok_or("Store path required for reset")?;
            if !yes {
                return Err("reset drops every scope in the store; pass --yes to confirm".into());
            }
            commands::reset::run(&path)?;
        }
        Commands::Demo { format } => {
            commands::demo::run(cli.path.as_deref(), format)?;
        }
        Commands::Version => {
            println!("crdtsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("crdtsync core v{}", crdtsync_core::VERSION);
            println!("document format v{}", crdtsync_core::FORMAT_VERSION);
        }
    }

    Ok(())
}
