// rest_api/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lib::Database;
use rest_api::{start_server, PortalConfig};

#[derive(Debug, Parser)]
#[command(name = "portal", version, about = "Multi-tenant healthcare records portal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the REST API.
    Serve {
        /// Configuration file (defaults to ./portal.toml when present).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Create the global admin account if there is none yet.
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down."),
        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => {
            let config = PortalConfig::load(config.as_deref())?;
            start_server(config, shutdown_signal()).await
        }
        Command::CreateAdmin { username, email, password, config } => {
            let config = PortalConfig::load(config.as_deref())?;
            let db = Database::open(&config.storage_config()).context("Failed to open portal storage")?;
            match db.create_global_admin(&username, &email, &password).await? {
                Some(admin) => info!("Admin user created: {}", admin.email),
                None => info!("Admin user already exists, nothing to do."),
            }
            db.flush().await?;
            Ok(())
        }
    }
}
