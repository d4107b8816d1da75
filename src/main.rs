use anyhow::Result;
use clap::{Parser, Subcommand};

use announce_watch::cli;
use announce_watch::config::Config;

#[derive(Parser)]
#[command(
    name = "announce-watch",
    about = "Market announcements watcher — polls the ASX feed and enriches new items with market data",
    version
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the announcements feed continuously
    Run,
    /// Execute a single poll cycle and exit
    Once,
    /// Inspect or refresh the auth token pool
    Tokens {
        /// Force a browser-driven refresh before reporting
        #[arg(long)]
        refresh: bool,
    },
    /// Check environment and diagnose issues
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("announce_watch={default_level}").parse()?),
        )
        .init();

    let cfg = Config::from_env();

    match args.command {
        Commands::Run => cli::run_cmd::run(cfg).await,
        Commands::Once => cli::run_cmd::once(cfg).await,
        Commands::Tokens { refresh } => cli::tokens_cmd::run(cfg, refresh).await,
        Commands::Doctor => cli::doctor::run(cfg).await,
    }
}
