use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use prevtech_ai::{Config, commands, tui};

#[derive(Parser)]
#[command(name = "prevtech-ai")]
#[command(version = "0.1.0")]
#[command(about = "PREVTECH virtual assistant chat widget", long_about = None)]
struct Cli {
    /// Config file (default: ~/.prevtech-ai/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat widget (default)
    Chat,
    /// Ask a single question and print the reply
    Ask { text: String },
    /// Print the host-page listener script
    Snippet {
        #[arg(long, default_value = "prevtech-ai-frame")]
        iframe_id: String,
    },
    /// Write the current configuration to disk
    InitConfig,
}

/// The TUI owns the terminal, so its logs go to a file
fn init_logging(config: &Config, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if interactive {
        std::fs::create_dir_all(&config.home).context("Failed to create widget home directory")?;
        let log_path = config.log_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let interactive = matches!(cli.command, None | Some(Commands::Chat));
    init_logging(&config, interactive)?;
    if !config.file_found {
        tracing::info!(home = %config.home.display(), "config file not found, using defaults");
    }

    match cli.command {
        None | Some(Commands::Chat) => tui::run(&config).await,
        Some(Commands::Ask { text }) => commands::ask(&config, &text).await,
        Some(Commands::Snippet { iframe_id }) => commands::snippet(&config, &iframe_id),
        Some(Commands::InitConfig) => commands::init_config(&config),
    }
}
