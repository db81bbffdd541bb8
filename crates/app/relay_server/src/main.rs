//! Relay server binary.
//!
//! Opens the configured installation store, then serves the control-plane
//! API and the webhook endpoint until interrupted.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use relay_api::config::ApiConfig;
use relay_core::settings::HttpSettingsSource;
use relay_core::storage::{StorageConfig, open_store};

const DEFAULT_LOG_FILTER: &str = "info,relay_api=debug,relay_core=debug";

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "relay_server", about = "Relay webhook and control-plane server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:5000")]
    bind_addr: String,

    /// JSON file to store installations in. Takes priority over `--database-url`.
    #[arg(long, env = "DATABASE_JSON_FILE")]
    database_json_file: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Length of a webhook recording window, in seconds.
    #[arg(long, env = "RECORDING_WINDOW_SECS")]
    recording_window_secs: Option<i64>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    let storage = StorageConfig::select(args.database_json_file, args.database_url)?;
    info!(bind_addr = %args.bind_addr, "starting relay_server");
    let store = open_store(&storage).await?;

    let mut config = ApiConfig::from_env();
    config.bind_addr = args.bind_addr;
    if let Some(secs) = args.recording_window_secs.filter(|s| *s > 0) {
        config.recording_window_secs = secs;
    }
    if config.webhook_secret.is_none() {
        warn!("WEBHOOK_SECRET is not set, webhook signatures will not be checked");
    }

    let settings = Arc::new(HttpSettingsSource::new(reqwest::Client::new()));
    let state = relay_api::AppState::new(config.clone(), store, settings);
    let app = relay_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
