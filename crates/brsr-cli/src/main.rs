mod cmd;
mod output;

use brsr_core::config::DEFAULT_CONFIG_FILE;
use clap::{Parser, Subcommand};
use cmd::{
    catalog::CatalogSubcommand, config::ConfigSubcommand, counters::CountersSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "brsr",
    about = "BRSR report server: serve the API, inspect the question catalog, repair progress counters",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the config file (missing file means defaults)
    #[arg(long, global = true, env = "BRSR_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Interface to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides server.port, 0 = OS-assigned)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Inspect and validate the question catalog
    Catalog {
        #[command(subcommand)]
        subcommand: CatalogSubcommand,
    },

    /// Show or rebuild progress counters for a report
    Counters {
        #[command(subcommand)]
        subcommand: CountersSubcommand,
    },

    /// Create, show and validate the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_path();

    let result = match cli.command {
        Commands::Serve { host, port } => cmd::serve::run(config_path, host, port),
        Commands::Catalog { subcommand } => cmd::catalog::run(config_path, subcommand, cli.json),
        Commands::Counters { subcommand } => {
            cmd::counters::run(config_path, subcommand, cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(config_path, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
