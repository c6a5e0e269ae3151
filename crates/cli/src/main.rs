//! Palaver CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Create the config file and data directories
//! - `chat`   : Interactive terminal chat or single-message mode
//! - `daemon` : Serve every enabled chat channel
//! - `status` : Show configuration and store status
//! - `prompts`: List the saved system prompts

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "palaver",
    about = "Palaver — a conversational personal assistant",
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
    /// Create configuration and data directories
    Onboard,

    /// Chat with the assistant in the terminal
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Serve every channel enabled in the config
    Daemon,

    /// Show configuration and store status
    Status,

    /// List saved system prompts
    Prompts {
        /// Only print prompt names
        #[arg(long)]
        names_only: bool,
    },
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
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Daemon => commands::daemon::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Prompts { names_only } => commands::prompts::run(names_only).await?,
    }

    Ok(())
}
