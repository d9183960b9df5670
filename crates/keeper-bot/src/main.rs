//! Unattended settlement agent entry point.

use anyhow::Context;
use clap::Parser;
use keeper_bot::app::Application;
use keeper_bot::config::AppConfig;
use keeper_bot::logging::init_logging;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "keeper", about = "Unattended settlement agent")]
struct Args {
    /// Path to the TOML configuration file. Falls back to the
    /// KEEPER_CONFIG environment variable.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    keeper_stream::init_crypto();
    init_logging();

    let config_path = args
        .config
        .or_else(|| std::env::var("KEEPER_CONFIG").ok())
        .unwrap_or_else(|| "keeper.toml".to_string());
    info!(path = %config_path, "Loading configuration");

    let config = AppConfig::from_file(&config_path)
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    let app = Application::new(config).context("failed to build application")?;
    app.run_preflight().await.context("preflight failed")?;

    app.run().await.context("runtime error")?;
    Ok(())
}
