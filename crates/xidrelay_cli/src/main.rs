//! xidrelay CLI
//!
//! Command-line tools for running and inspecting xidrelay replication.
//!
//! # Commands
//!
//! - `logswitch` - Rotate and retire log generations on a master
//! - `tables` - List the tables a node would replicate
//! - `topology` - Show clusters loaded from a topology file
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// xidrelay replication tools.
#[derive(Parser)]
#[command(name = "xidrelay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rotate and retire transaction log generations
    Logswitch {
        /// Master database connection string
        #[arg(short, long)]
        url: String,

        /// JSON settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Rotation interval in minutes (overrides the settings file)
        #[arg(long)]
        rotate_minutes: Option<u64>,

        /// Retention interval in minutes (overrides the settings file)
        #[arg(long)]
        retain_minutes: Option<u64>,

        /// Pause between ticks in milliseconds (overrides the settings file)
        #[arg(long)]
        tick_delay_ms: Option<u64>,

        /// Cluster namespace for the log tables (overrides the settings file)
        #[arg(long)]
        cluster_id: Option<u64>,

        /// Run one tick and exit
        #[arg(long)]
        once: bool,

        /// Create the log schema, catalog table and row sequence first
        #[arg(long)]
        init: bool,
    },

    /// List the tables a node would replicate
    Tables {
        /// Node database connection string
        #[arg(short, long)]
        url: String,

        /// Include-table pattern (matches whole schema.table names)
        #[arg(short, long)]
        include: Option<String>,

        /// Restrict to one schema
        #[arg(short, long)]
        schema: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show clusters from a JSON topology file
    Topology {
        /// Topology file
        #[arg(short, long)]
        file: PathBuf,

        /// Show only this cluster
        #[arg(short, long)]
        cluster: Option<String>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if cli.verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new("info"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Logswitch {
            url,
            config,
            rotate_minutes,
            retain_minutes,
            tick_delay_ms,
            cluster_id,
            once,
            init,
        } => {
            let overrides = commands::logswitch::Overrides {
                rotate_minutes,
                retain_minutes,
                tick_delay_ms,
                cluster_id,
            };
            let config = commands::logswitch::load_config(config.as_deref(), &overrides)?;
            commands::logswitch::run(&url, config, once, init)?;
        }
        Commands::Tables {
            url,
            include,
            schema,
            format,
        } => {
            commands::tables::run(&url, include.as_deref(), schema.as_deref(), &format)?;
        }
        Commands::Topology {
            file,
            cluster,
            format,
        } => {
            commands::topology::run(&file, cluster.as_deref(), &format)?;
        }
        Commands::Version => {
            println!("xidrelay CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("xidrelay Core v{}", xidrelay_core::VERSION);
        }
    }

    Ok(())
}
