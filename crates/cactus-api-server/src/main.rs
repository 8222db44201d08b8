//! Cactus API server binary

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cactus_api_server::{ApiServer, ApiServerConfig, ServerError};

#[derive(Parser, Debug)]
#[command(name = "cactus-api-server", version, about = "Cactus API server")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "CACTUS_CONFIG_FILE")]
    config: PathBuf,

    /// Overrides `api_port`
    #[arg(long, env = "CACTUS_API_PORT")]
    api_port: Option<u16>,

    /// Overrides `log_level`
    #[arg(long, env = "CACTUS_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let args = Args::parse();

    let mut config = ApiServerConfig::load(&args.config)?;
    if let Some(port) = args.api_port {
        config.api_port = port;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    config.validate()?;

    let log_level = config.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ServerError::Io(std::io::Error::other(e)))?;

    info!(
        config = %args.config.display(),
        authorization = ?config.authorization_protocol,
        plugins = config.plugins.len(),
        "Starting Cactus API server"
    );

    let running = ApiServer::new(config)?.start().await?;
    info!(url = %running.base_url(), "Ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    running.shutdown().await
}
