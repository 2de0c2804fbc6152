//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod data;
mod generate;
mod init;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "catalog-enrich")]
#[command(about = "Enrich a supplier/product catalog from web search and LLM inference")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the default SQLite database (overrides config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and the default catalog table
    Init,

    /// Start the HTTP API server
    Serve {
        /// Address to bind: PORT, HOST or HOST:PORT (default from config, else 0.0.0.0:5000)
        bind: Option<String>,
    },

    /// Generate and store one catalog entry
    Generate {
        /// Supplier name
        supplier: String,
        /// Product name
        product: String,
        /// Target table (defaults to the configured default table)
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Print all rows of a table as JSON
    Data {
        /// Table to read (defaults to the configured default table)
        table: Option<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
    };
    let (settings, config) = load_settings_with_options(options).await;
    if let Some(path) = config.source_path.as_deref() {
        tracing::debug!("Loaded config from {}", path.display());
    }

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.bind.clone());
            serve::cmd_serve(&settings, &bind).await
        }
        Commands::Generate {
            supplier,
            product,
            table,
        } => generate::cmd_generate(&settings, &supplier, &product, table.as_deref()).await,
        Commands::Data { table } => data::cmd_data(&settings, table.as_deref()).await,
    }
}
