//! Binary entry point for the artifact proxy.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use artifact_proxy::config::loader::{load_config, load_default};
use artifact_proxy::config::watcher::ConfigWatcher;
use artifact_proxy::lifecycle::{signals, Shutdown};
use artifact_proxy::observability::{logging, metrics};
use artifact_proxy::{net, HttpServer};

#[derive(Parser)]
#[command(name = "artifact-proxy")]
#[command(about = "Reverse proxy fronting the artifact gateway and edge services")]
struct Args {
    /// Path to a TOML config file. Without one, the stock deployment
    /// defaults (plus environment overrides) are used.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_default()?,
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("artifact-proxy v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        upstreams = config.upstreams.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let listener = net::bind(&config.listener).await?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    // Hot reload: file watcher (when a config file is in use) and SIGHUP
    // both feed the same update channel.
    let _watcher_handle = match &args.config {
        Some(path) => {
            let (watcher, mut watcher_rx) = ConfigWatcher::new(path);
            let tx = update_tx.clone();
            tokio::spawn(async move {
                while let Some(new_config) = watcher_rx.recv().await {
                    let _ = tx.send(new_config);
                }
            });
            Some(watcher.run()?)
        }
        None => None,
    };

    tokio::spawn(signals::listen(
        shutdown.clone(),
        args.config.clone(),
        update_tx,
    ));

    let server = HttpServer::new(config);
    server.run(listener, update_rx, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
