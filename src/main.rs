mod cli;
mod commands;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use persona_core::{AppConfig, ErrorExt, ErrorReporter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting reddit-persona {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = commands::dispatch(cli.command, &config).await {
        ErrorReporter::new().report_stage_error(&e);
        let message = e.source.user_friendly_message();
        return Err(anyhow::Error::new(e).context(message));
    }
    Ok(())
}
