//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Surface bind problems as a typed error
//!
//! # Design Decisions
//! - Concurrency backpressure lives in the middleware stack
//!   (GlobalConcurrencyLimitLayer), not in the accept loop, so slow
//!   handlers cannot starve the accept path

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The configured bind address is not a socket address.
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),
    /// Failed to bind to the address.
    #[error("Failed to bind: {0}")]
    Bind(#[from] std::io::Error),
}

/// Bind the proxy listener according to configuration.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|_| ListenerError::InvalidAddress(config.bind_address.clone()))?;

    let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    tracing::info!(
        address = %local_addr,
        max_connections = config.max_connections,
        tls = config.tls.is_some(),
        "Listener bound"
    );

    Ok(listener)
}
