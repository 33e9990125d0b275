//! distsync CLI
//!
//! Command-line tool for moving catalog records between a working store and
//! a distribution store.
//!
//! # Commands
//!
//! - `export` - Reconcile the distribution store with the working store
//! - `import` - Reconcile the working store with the distribution store
//! - `inspect` - Display per-table record counts of a store file
//! - `init` - Create an empty store file

mod commands;

use clap::{Parser, Subcommand};
use commands::{sync::SyncArgs, Format};
use distsync_core::{Direction, StoreConfig, DEFAULT_DIST_PATH, DEFAULT_SOURCE_PATH};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// distsync command-line tools.
#[derive(Parser)]
#[command(name = "distsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the working store
    #[arg(global = true, long, default_value = DEFAULT_SOURCE_PATH)]
    source: PathBuf,

    /// Path to the distribution store
    #[arg(global = true, long, default_value = DEFAULT_DIST_PATH)]
    dist: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy changes from the working store to the distribution store
    Export(SyncArgs),

    /// Copy changes from the distribution store to the working store
    Import(SyncArgs),

    /// Display per-table record counts of a store file
    Inspect {
        /// Store file to inspect
        #[arg(short, long)]
        path: PathBuf,

        /// List the natural key of every record
        #[arg(short, long)]
        keys: bool,
    },

    /// Create an empty store file
    Init {
        /// Store file to create
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let stores = StoreConfig::new()
        .source_path(cli.source)
        .dist_path(cli.dist);

    match cli.command {
        Commands::Export(args) => {
            commands::sync::run(&stores, Direction::Export, &args, cli.format)?;
        }
        Commands::Import(args) => {
            commands::sync::run(&stores, Direction::Import, &args, cli.format)?;
        }
        Commands::Inspect { path, keys } => {
            commands::inspect::run(&path, keys, cli.format)?;
        }
        Commands::Init { path } => {
            commands::init::run(&path)?;
        }
        Commands::Version => {
            println!("distsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("distsync Core v{}", distsync_core::VERSION);
        }
    }

    Ok(())
}
