//! Docker stats CLI
//!
//! Command-line access to the collector: list the latest image usage
//! reported by each instance and trigger prunes.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{prune, stats};

/// Docker Stats CLI
#[derive(Parser)]
#[command(name = "dsc")]
#[command(author, version, about = "CLI for the Docker Stats collector", long_about = None)]
pub struct Cli {
    /// Collector URL (can also be set via DSC_COLLECTOR_URL env var)
    #[arg(long, env = "DSC_COLLECTOR_URL", default_value = "http://localhost:3000")]
    pub collector_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the latest snapshot of every instance
    List,

    /// Trigger a prune on an instance's agent
    Prune {
        /// Instance ID as reported by the agent
        instance: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.collector_url)?;

    let result = match &cli.command {
        Commands::List => stats::list_stats(&client, cli.format).await,
        Commands::Prune { instance } => prune::prune_instance(&client, instance, cli.format).await,
    };

    if let Err(e) = &result {
        output::print_error(&format!("{:#}", e));
    }
    result
}
