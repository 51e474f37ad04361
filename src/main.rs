//! Sizetree CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "sizetree")]
#[command(about = "Aggregate binary size reports into an explorable tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a report to WebSocket clients
    Serve {
        /// Report to load for every connection: http(s) URL or local path
        #[arg(long)]
        url: String,

        /// Port to listen on
        #[arg(short, long, default_value = "7890")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Read whole response bodies instead of streaming them
        #[arg(long)]
        buffered: bool,
    },
    /// Build the tree and print the final progress message
    Load {
        /// http(s) URL or local path of the report
        source: String,

        /// Options query string, e.g. `group_by=component&min_size=100`
        #[arg(short, long, default_value = "")]
        options: String,

        #[arg(long)]
        buffered: bool,
    },
    /// Build the tree and print one node of it
    Open {
        source: String,

        /// idPath of the node to print
        id_path: String,

        #[arg(short, long, default_value = "")]
        options: String,

        #[arg(long)]
        buffered: bool,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so printed trees stay parseable.
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("sizetree={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = commands::worker_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { url, port, host, buffered } => {
            commands::serve(url, host, port, commands::with_read_mode(config, buffered)).await
        }
        Commands::Load { source, options, buffered } => {
            commands::load(&source, &options, commands::with_read_mode(config, buffered)).await
        }
        Commands::Open { source, id_path, options, buffered } => {
            commands::open(&source, &id_path, &options, commands::with_read_mode(config, buffered)).await
        }
        Commands::Version => {
            println!("sizetree v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
