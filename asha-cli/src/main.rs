mod commands;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use logger_redacted::{init_tracing, LoggerConfig};

#[derive(Parser)]
#[command(name = "asha-sync", version, about = "Inspect and drive the ASHA offline sync engine")]
struct Cli {
    /// Settings file (YAML); missing is fine
    #[arg(long, global = true, default_value = "asha-sync.yaml", env = "ASHA_CONFIG")]
    config: String,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connectivity, hydration and queue overview
    Status,
    /// Replay the sync queue now
    Replay,
    /// Force a full refresh from the server
    Refresh,
    /// List operations that ran out of retries
    DeadLetters {
        /// Remove them after printing
        #[arg(long)]
        clear: bool,
    },
    /// Print the effective settings
    Config,
    /// Run the connectivity controller with a health probe until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&LoggerConfig::for_environment("ASHA_ENV").with_verbose(cli.verbose))?;

    let config = settings::load(&cli.config)?;

    match cli.command {
        Command::Status => commands::status(config).await,
        Command::Replay => commands::replay(config).await,
        Command::Refresh => commands::refresh(config).await,
        Command::DeadLetters { clear } => commands::dead_letters(config, clear).await,
        Command::Config => commands::show_config(&config),
        Command::Run => commands::run(config).await,
    }
}
