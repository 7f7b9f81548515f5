//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//! The defaults encode the standard deployment topology: listener on 8081,
//! the gateway API behind `/api/v1/` and the edge frontend on the fallback.

use serde::{Deserialize, Serialize};

/// `client_max_body_size` for the API route. Artifact uploads are large.
pub const API_MAX_BODY_BYTES: usize = 1000 * 1024 * 1024;

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Route definitions mapping requests to upstreams.
    pub routes: Vec<RouteConfig>,

    /// Named upstream server pools.
    pub upstreams: Vec<UpstreamConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security hardening settings.
    pub security: SecurityConfig,
}

impl Default for ProxyConfig {
    /// The stock deployment: proxy on 8081, gateway and edge on their
    /// compose-internal addresses, the three-rule routing table.
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            routes: vec![
                RouteConfig {
                    name: "api-index-redirect".to_string(),
                    host: None,
                    path: Some("/api/v1".to_string()),
                    path_prefix: None,
                    upstream: None,
                    strip_prefix: false,
                    redirect_to: Some("/api/v1/".to_string()),
                    redirect_status: 302,
                    max_body_bytes: None,
                    priority: 30,
                },
                RouteConfig {
                    name: "api".to_string(),
                    host: None,
                    path: None,
                    path_prefix: Some("/api/v1/".to_string()),
                    upstream: Some("gateway".to_string()),
                    strip_prefix: true,
                    redirect_to: None,
                    redirect_status: 302,
                    max_body_bytes: Some(API_MAX_BODY_BYTES),
                    priority: 20,
                },
                RouteConfig {
                    name: "edge".to_string(),
                    host: None,
                    path: None,
                    path_prefix: Some("/".to_string()),
                    upstream: Some("edge".to_string()),
                    strip_prefix: false,
                    redirect_to: None,
                    redirect_status: 302,
                    max_body_bytes: None,
                    priority: 10,
                },
            ],
            upstreams: vec![
                UpstreamConfig {
                    name: "gateway".to_string(),
                    balance: BalanceStrategy::RoundRobin,
                    servers: vec![ServerConfig {
                        address: "gateway:8000".to_string(),
                        weight: 1,
                        max_connections: default_max_server_conns(),
                    }],
                },
                UpstreamConfig {
                    name: "edge".to_string(),
                    balance: BalanceStrategy::RoundRobin,
                    servers: vec![ServerConfig {
                        address: "edge:8000".to_string(),
                        weight: 1,
                        max_connections: default_max_server_conns(),
                    }],
                },
            ],
            health_check: HealthCheckConfig::default(),
            timeouts: TimeoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retries: RetryConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Route configuration.
///
/// A route either forwards to an `upstream` or answers a `redirect_to`;
/// validation rejects routes that specify both or neither.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match, case-insensitive).
    #[serde(default)]
    pub host: Option<String>,

    /// Exact path to match.
    #[serde(default)]
    pub path: Option<String>,

    /// Path prefix to match.
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Upstream pool name to forward to.
    #[serde(default)]
    pub upstream: Option<String>,

    /// Strip the matched `path_prefix` from the forwarded path.
    #[serde(default)]
    pub strip_prefix: bool,

    /// Location to redirect to instead of forwarding.
    #[serde(default)]
    pub redirect_to: Option<String>,

    /// Status code for the redirect (301, 302, 307, 308).
    #[serde(default = "default_redirect_status")]
    pub redirect_status: u16,

    /// Maximum request body size for this route, in bytes.
    #[serde(default)]
    pub max_body_bytes: Option<usize>,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

fn default_redirect_status() -> u16 {
    302
}

/// A named upstream server pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique pool name referenced by routes.
    pub name: String,

    /// Balancing strategy for this pool.
    #[serde(default)]
    pub balance: BalanceStrategy,

    /// Servers in this pool.
    pub servers: Vec<ServerConfig>,
}

/// A single server inside an upstream pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server authority (e.g., "gateway:8000" or "127.0.0.1:3000").
    pub address: String,

    /// Weight for weighted balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Maximum concurrent connections to this server.
    #[serde(default = "default_max_server_conns")]
    pub max_connections: usize,
}

fn default_weight() -> u32 {
    1
}

fn default_max_server_conns() -> usize {
    1024
}

/// Balancing strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStrategy {
    #[default]
    RoundRobin,
    LeastConnections,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Idle connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            // Large artifact uploads and downloads take a while.
            request_secs: 300,
            idle_secs: 60,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable per-IP rate limiting.
    pub enabled: bool,

    /// Maximum requests per second per IP.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Fraction of recent requests that may be retries (retry budget).
    /// e.g., 0.1 for a 10% budget.
    pub budget_ratio: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            budget_ratio: 0.1,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Append X-Forwarded-For / X-Forwarded-Proto on forwarded requests.
    pub forwarding_headers: bool,

    /// Global maximum body size in bytes (routes may set a lower cap).
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            forwarding_headers: true,
            max_body_size: API_MAX_BODY_BYTES,
        }
    }
}
