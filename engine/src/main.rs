// Neuroljus Engine
// Main entry point for the neuroljus binary

use clap::Parser;
use neuroljus_engine::cli::{Cli, Command};
use neuroljus_engine::config::Config;
use neuroljus_engine::handlers::{handle_chat, handle_doctor, handle_feed, OutputFormat};
use neuroljus_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Neuroljus Engine v{} ({} - {})", version, commit, timestamp);

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Re-initialize telemetry with the CLI override or config-driven level
    // (only takes effect if RUST_LOG env var is not set)
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    match cli.command {
        Command::Chat { mode } => {
            tracing::info!("Starting conversation session...");
            handle_chat(&config, mode, format).await
        }

        Command::Feed { ticks } => {
            tracing::info!("Starting telemetry feed...");
            handle_feed(&config, ticks, format).await
        }

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
