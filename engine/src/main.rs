// Wizzy Telegram assistant
// Main entry point for the wizzy binary

use clap::Parser;
use wizzy_engine::cli::{Cli, Command};
use wizzy_engine::config::Config;
use wizzy_engine::handlers::{handle_poll, handle_serve, handle_set_webhook};
use wizzy_engine::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    init_telemetry(
        cli.log.as_deref().unwrap_or(&config.core.log_level),
        config.core.log_format,
    );

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Wizzy v{} ({} - {})", version, commit, timestamp);

    match cli.command {
        Command::Serve => handle_serve(&config).await,
        Command::Poll => handle_poll(&config).await,
        Command::SetWebhook { url } => handle_set_webhook(url, &config).await,
    }
}
