//! vmsched CLI
//!
//! Dry-run placement of a batch against a fleet snapshot file.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vmsched_core::{LogFormat, LoggingConfig, VmschedConfig};

/// vmsched - batch placement of virtual machines onto a host fleet
#[derive(Parser, Debug)]
#[command(name = "vmsched")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Place a batch against a fleet snapshot and print the destinations
    Select {
        /// Fleet snapshot (JSON array of host states)
        #[arg(long)]
        fleet: PathBuf,

        /// Placement request (JSON)
        #[arg(long)]
        request: PathBuf,

        /// Seed for the subset pick
        #[arg(long)]
        seed: Option<u64>,

        /// Host subset size, overrides the configuration file
        #[arg(long, allow_negative_numbers = true)]
        subset_size: Option<i64>,
    },

    /// Parse a configuration file and print the effective settings
    CheckConfig {
        /// Configuration file to check
        path: PathBuf,
    },
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => VmschedConfig::from_file(path)?,
        None => VmschedConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Select {
            fleet,
            request,
            seed,
            subset_size,
        } => {
            if let Some(size) = subset_size {
                config.scheduler.host_subset_size = size;
            }
            commands::select(&config, &fleet, &request, seed).await?;
        }
        Commands::CheckConfig { path } => {
            commands::check_config(&path)?;
        }
    }

    Ok(())
}
