//! Kiln CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Incremental TypeScript build and watch pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Package root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the package once and exit
    Build {
        /// Print lifecycle events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Build, then rebuild on every source change
    Watch {
        /// Print lifecycle events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Remove the output directory
    Clean,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "kiln={0},kiln_core={0},kiln_compiler={0},kiln_watcher={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Kiln v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Package root: {}", cli.root.display());

    match cli.command {
        Commands::Build { json } => commands::build(cli.root, json).await,
        Commands::Watch { json } => commands::watch(cli.root, json).await,
        Commands::Clean => commands::clean(cli.root).await,
        Commands::Version => {
            println!("Kiln v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
