//! Oasis CLI — entry point.
//!
//! # Commands
//!
//! - `oasis agent [-m MESSAGE]` — talk to the assistant (one-shot or REPL)
//! - `oasis run` — start the full runtime (router + scheduler) on the console frontend
//! - `oasis onboard` — initialize config + data directories
//! - `oasis status` — show configuration summary

mod console;
mod gateway;
mod helpers;
mod onboard;
mod repl;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Oasis — personal assistant runtime
#[derive(Parser)]
#[command(name = "oasis", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to the assistant (one-shot with -m, REPL otherwise)
    Agent {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Start the full runtime: router, scheduler, console frontend
    Run {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Initialize configuration and data directories
    Onboard,

    /// Show configuration summary
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Agent { message, logs } => {
            init_logging(logs);
            gateway::run_agent(message).await
        }
        Commands::Run { logs } => {
            init_logging(logs);
            gateway::run().await
        }
        Commands::Onboard => onboard::run(),
        Commands::Status => status::run(),
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("oasis=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
