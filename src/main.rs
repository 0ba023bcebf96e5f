//! # Social Linker Main Entry Point
//!
//! Loads layered configuration, installs tracing, prepares the database, and
//! serves the linking API.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use social_linker::{config::ConfigLoader, db, server::run_server, telemetry};

#[derive(Parser, Debug)]
#[command(name = "social-linker", version, about = "Social platform account linking service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Apply migrations and serve the HTTP API (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("Failed to load configuration")?;
    telemetry::init_tracing(&config).context("Failed to initialize tracing")?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    match config.redacted_json() {
        Ok(redacted) => tracing::debug!(config = %redacted, "Effective configuration"),
        Err(err) => tracing::warn!(error = %err, "Could not render configuration"),
    }

    let db = db::init_pool(&config).await?;
    db::run_migrations(&db).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            tracing::info!("Migrations applied");
            Ok(())
        }
        Command::Serve => run_server(config, db).await,
    }
}
