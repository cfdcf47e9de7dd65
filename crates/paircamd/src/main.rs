//! # paircamd
//!
//! PairCam relay server daemon — loads settings, wires the server together
//! and runs it until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use paircam_server::config::ServerConfig;
use paircam_server::metrics::install_recorder;
use paircam_server::server::RelayServer;

/// PairCam relay server.
#[derive(Parser, Debug)]
#[command(name = "paircamd", about = "PairCam session pairing and capture relay server")]
struct Cli {
    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings if specified; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Session TTL in seconds (overrides settings if specified).
    #[arg(long)]
    ttl_secs: Option<u64>,

    /// Log level (overrides settings if specified).
    #[arg(long)]
    log_level: Option<String>,

    /// Path to the settings file (defaults to `~/.paircam/settings.json`).
    #[arg(long)]
    settings_file: Option<PathBuf>,
}

/// Apply CLI overrides on top of the loaded settings.
fn resolve_config(cli: &Cli, settings: &paircam_settings::PaircamSettings) -> ServerConfig {
    let mut config = ServerConfig::from_settings(settings);
    if let Some(host) = &cli.host {
        config.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ttl) = cli.ttl_secs {
        config.session_ttl_secs = ttl;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings_file
        .clone()
        .unwrap_or_else(paircam_settings::loader::settings_path);
    let settings =
        paircam_settings::loader::load_settings_from_path(&settings_path).unwrap_or_default();

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| settings.logging.level.as_filter_str().to_string());
    paircam_core::logging::init_subscriber(&log_level);

    let metrics = install_recorder();

    let config = resolve_config(&args, &settings);
    let server = RelayServer::new(config, metrics);

    let sweeper = server.spawn_sweeper();
    let listener = server.bind().await.context("Failed to bind server")?;
    let addr = listener.local_addr()?;
    tracing::info!("PairCam relay listening on http://{addr}");

    let shutdown = server.shutdown().clone();
    let serve = tokio::spawn(async move {
        if let Err(err) = server.serve(listener).await {
            tracing::error!(error = %err, "server exited with error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    shutdown.graceful_shutdown(vec![serve, sweeper], None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
