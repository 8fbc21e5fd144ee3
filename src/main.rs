//! CLI entry point.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "scopegraph")]
#[command(about = "Ingests a source codebase into a property graph and serves a RAG query pipeline over it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Path to the project config file
    #[arg(short, long, default_value = "scopegraph.yaml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full ingestion pass and exit
    Index,
    /// Watch the project root and re-ingest on change
    Watch,
    /// Start the query operations server
    Serve {
        #[arg(short, long, default_value = "7890")]
        port: u16,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("scopegraph={log_level}")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("scopegraph v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(root = %cli.root.display(), "project root");

    match cli.command {
        Commands::Index => commands::index(cli.root, cli.config).await,
        Commands::Watch => commands::watch(cli.root, cli.config).await,
        Commands::Serve { port, host } => commands::serve(cli.root, cli.config, host, port).await,
        Commands::Version => {
            println!("scopegraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
