//! SwarmForge CLI — the main entry point.
//!
//! Commands:
//! - `run`       — Run an agent swarm on a task
//! - `review`    — Score a file with the specialist panel
//! - `agents`    — List the agents a run would use
//! - `providers` — Show configured providers and credentials
//! - `status`    — Show configuration and memory status
//! - `onboard`   — Initialize config & memory directories

use clap::{Parser, Subcommand};

mod commands;
mod run_log;
mod runtime;

#[derive(Parser)]
#[command(
    name = "swarmforge",
    about = "SwarmForge — multi-agent pipelines with provider fallback and critique loops",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and memory directories
    Onboard,

    /// Run an agent swarm on a task
    Run(commands::run::RunArgs),

    /// Review a file with the specialist panel
    Review(commands::review::ReviewArgs),

    /// List agents in run order
    Agents {
        /// Show a built-in preset (code, critique, review) instead of the configured catalog
        #[arg(short, long)]
        preset: Option<String>,
    },

    /// Show configured providers
    Providers,

    /// Show system status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Run(args) => commands::run::run(args).await?,
        Commands::Review(args) => commands::review::run(args).await?,
        Commands::Agents { preset } => commands::agents::run(preset).await?,
        Commands::Providers => commands::providers::run().await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
