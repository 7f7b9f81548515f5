//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing upstreams)
//! - Validate value ranges (timeouts > 0, redirect codes are 3xx)
//! - Detect routes that can never act (no matcher, no action)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid listener bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("route '{route}' references unknown upstream '{upstream}'")]
    UnknownUpstream { route: String, upstream: String },

    #[error("route '{0}' must set exactly one of 'upstream' or 'redirect_to'")]
    AmbiguousAction(String),

    #[error("route '{0}' has no host, path, or path_prefix condition")]
    UnmatchableRoute(String),

    #[error("route '{0}' sets strip_prefix without a path_prefix")]
    StripWithoutPrefix(String),

    #[error("route '{route}' redirect status {status} is not a 3xx code")]
    InvalidRedirectStatus { route: String, status: u16 },

    #[error("upstream '{0}' has no servers")]
    EmptyUpstream(String),

    #[error("upstream '{0}' is defined more than once")]
    DuplicateUpstream(String),

    #[error("upstream '{upstream}' has invalid server address '{address}'")]
    InvalidServerAddress { upstream: String, address: String },

    #[error("{field}: {detail}")]
    OutOfRange { field: &'static str, detail: String },
}

/// Check a configuration for semantic problems. Collects every error rather
/// than stopping at the first.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut upstream_names: HashSet<&str> = HashSet::new();
    for upstream in &config.upstreams {
        if !upstream_names.insert(upstream.name.as_str()) {
            errors.push(ValidationError::DuplicateUpstream(upstream.name.clone()));
        }
        if upstream.servers.is_empty() {
            errors.push(ValidationError::EmptyUpstream(upstream.name.clone()));
        }
        for server in &upstream.servers {
            // Authorities like "gateway:8000" are only resolvable inside the
            // deployment network, so validate shape, not reachability.
            let parsed = Url::parse(&format!("http://{}", server.address));
            let shaped = parsed
                .as_ref()
                .map(|u| u.host_str().is_some() && u.path() == "/" && u.query().is_none())
                .unwrap_or(false);
            if !shaped {
                errors.push(ValidationError::InvalidServerAddress {
                    upstream: upstream.name.clone(),
                    address: server.address.clone(),
                });
            }
        }
    }

    for route in &config.routes {
        match (&route.upstream, &route.redirect_to) {
            (Some(upstream), None) => {
                if !upstream_names.contains(upstream.as_str()) {
                    errors.push(ValidationError::UnknownUpstream {
                        route: route.name.clone(),
                        upstream: upstream.clone(),
                    });
                }
            }
            (None, Some(_)) => {
                if !(300..400).contains(&route.redirect_status) {
                    errors.push(ValidationError::InvalidRedirectStatus {
                        route: route.name.clone(),
                        status: route.redirect_status,
                    });
                }
            }
            _ => errors.push(ValidationError::AmbiguousAction(route.name.clone())),
        }

        if route.host.is_none() && route.path.is_none() && route.path_prefix.is_none() {
            errors.push(ValidationError::UnmatchableRoute(route.name.clone()));
        }

        if route.strip_prefix && route.path_prefix.is_none() {
            errors.push(ValidationError::StripWithoutPrefix(route.name.clone()));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::OutOfRange {
            field: "timeouts.request_secs",
            detail: "must be greater than zero".to_string(),
        });
    }
    if config.retries.enabled && config.retries.max_attempts == 0 {
        errors.push(ValidationError::OutOfRange {
            field: "retries.max_attempts",
            detail: "must be at least 1 when retries are enabled".to_string(),
        });
    }
    if !(0.0..=1.0).contains(&config.retries.budget_ratio) {
        errors.push(ValidationError::OutOfRange {
            field: "retries.budget_ratio",
            detail: format!("{} is not in [0, 1]", config.retries.budget_ratio),
        });
    }
    if config.health_check.enabled
        && (config.health_check.healthy_threshold == 0
            || config.health_check.unhealthy_threshold == 0)
    {
        errors.push(ValidationError::OutOfRange {
            field: "health_check thresholds",
            detail: "must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
