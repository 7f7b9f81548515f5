//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - SIGTERM/SIGINT trigger graceful shutdown
//! - SIGHUP re-reads the config file and pushes it onto the update
//!   channel, same path as the file watcher
//! - Uses Tokio's signal handling (async-safe)

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::loader::{load_config, load_default};
use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;

/// Wait for OS signals and translate them into proxy events.
///
/// Runs until a shutdown signal arrives.
pub async fn listen(
    shutdown: Arc<Shutdown>,
    config_path: Option<PathBuf>,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                return;
            }
        };
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("SIGINT received, shutting down");
                    shutdown.trigger();
                    break;
                }
                _ = terminate.recv() => {
                    tracing::info!("SIGTERM received, shutting down");
                    shutdown.trigger();
                    break;
                }
                _ = hangup.recv() => {
                    tracing::info!("SIGHUP received, reloading configuration");
                    let reloaded = match &config_path {
                        Some(path) => load_config(path),
                        None => load_default(),
                    };
                    match reloaded {
                        Ok(config) => {
                            let _ = update_tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(
                                "Failed to reload config: {}. Keeping current configuration.",
                                e
                            );
                        }
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (config_path, update_tx);
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, shutting down");
            shutdown.trigger();
        }
    }
}
