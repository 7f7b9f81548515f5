//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + environment
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On reload signal:
//!     watcher.rs detects change (or SIGHUP re-reads the file)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server recompiles routing state and swaps it atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults encoding the stock deployment, so the proxy
//!   runs with no config file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::ProxyConfig;
pub use schema::ListenerConfig;
pub use schema::RouteConfig;
pub use schema::ServerConfig;
pub use schema::UpstreamConfig;
