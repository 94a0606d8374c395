//! K8s Pulse CLI
//!
//! A command-line tool for querying cluster capacity, pod usage and node
//! temperatures from a running K8s Pulse server.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cluster, node};

/// K8s Pulse CLI
#[derive(Parser)]
#[command(name = "pulsectl")]
#[command(author, version, about = "CLI for K8s Pulse", long_about = None)]
pub struct Cli {
    /// Server URL (can also be set via PULSE_API_URL env var)
    #[arg(long, env = "PULSE_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show node capacity, cluster totals and usage of every pod
    Cluster,

    /// Show usage of the pods in a namespace
    Namespace {
        /// Namespace name
        name: String,
    },

    /// Show a node and the resource requests of its pods
    Node {
        /// Node name
        name: String,
    },

    /// Show hardware temperatures of a node
    Temperature {
        /// Node name
        node: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Cluster => cluster::show_cluster(&client, cli.format).await?,
        Commands::Namespace { name } => {
            cluster::show_namespace(&client, &name, cli.format).await?
        }
        Commands::Node { name } => node::show_node(&client, &name, cli.format).await?,
        Commands::Temperature { node } => {
            node::show_temperature(&client, &node, cli.format).await?
        }
    }

    Ok(())
}
