//! Reverse proxy for the artifact database deployment.
//!
//! Publishes a single listener (port 8081 by default) and fans traffic out
//! to two internal upstream groups: the `gateway` API service behind
//! `/api/v1/` (with the prefix stripped before forwarding) and the `edge`
//! frontend service for everything else. An exact request for `/api/v1`
//! is answered with a 302 to `/api/v1/`.
//!
//! ```text
//!                        ┌──────────────────────────────────────────┐
//!                        │              ARTIFACT PROXY              │
//!   Client Request       │  ┌─────────┐   ┌────────┐   ┌─────────┐ │
//!   ─────────────────────┼─▶│   net   │──▶│  http  │──▶│ routing │ │
//!                        │  │listener │   │ server │   │  table  │ │
//!                        │  └─────────┘   └────────┘   └────┬────┘ │
//!                        │                                  │      │
//!                        │                          ┌───────▼────┐ │   ┌─────────┐
//!                        │                          │  upstream  │─┼──▶│ gateway │
//!                        │                          │   pools    │ │   ├─────────┤
//!                        │                          └────────────┘─┼──▶│  edge   │
//!                        │                                         │   └─────────┘
//!                        │  config · health · resilience · security│
//!                        │  observability · lifecycle              │
//!                        └──────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Traffic management
pub mod health;
pub mod upstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
