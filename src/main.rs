//! Onyx CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "onyx")]
#[command(about = "Code knowledge graph builder and live analyzer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Repository root path (defaults to ONYX_WORK_DIR, then the current directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Graph store directory (defaults to <root>/.onyx-graphdb)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Extra ignore globs (repeatable)
    #[arg(short, long)]
    ignore: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph for the repository and exit
    Build {
        /// Remove any existing store directory first
        #[arg(long)]
        cleanup: bool,

        /// Load a .env file before building
        #[arg(long)]
        load_env: bool,
    },
    /// Build the graph, then watch the repository for changes
    Watch,
    /// Run a read-only query against an existing store
    Query {
        /// Query text, e.g. 'MATCH (n:Function) RETURN n.name LIMIT 10'
        text: String,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("onyx={}", log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Build { cleanup, load_env } => {
            commands::build(cli.root, cli.db_path, cli.ignore, cleanup, load_env)
        }
        Commands::Watch => commands::watch(cli.root, cli.db_path, cli.ignore).await,
        Commands::Query { text } => commands::query(cli.root, cli.db_path, &text),
        Commands::Version => {
            println!("onyx v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
