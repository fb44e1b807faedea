//! CLUBLEDGER: investment club contribution and crypto ledger
//!
//! Entry point. Loads `.env` and configuration, initialises structured
//! logging, then dispatches the requested subcommand.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use clubledger::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let config_found = cli.config.exists();
    let cfg = cli::load_config(&cli.config)?;

    init_logging();

    if !config_found {
        info!(path = %cli.config.display(), "No config file found, using defaults");
    }
    info!(
        club = %cfg.club.name,
        data_dir = %cfg.storage.data_dir.display(),
        price_provider = %cfg.prices.provider,
        "CLUBLEDGER starting"
    );

    cli::run(cli, cfg).await
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("clubledger=info"));

    if std::env::var("CLUBLEDGER_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
