//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Respect `RUST_LOG` when set, otherwise the configured level
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - Request IDs flow through log fields, not message text

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// The environment (`RUST_LOG`) wins over the configured level so operators
/// can turn up verbosity without touching config files.
pub fn init_logging(configured_level: &str) {
    let fallback = format!("artifact_proxy={},tower_http=info", configured_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
