//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file, then apply
/// environment overrides.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: ProxyConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build the default configuration with environment overrides applied.
///
/// Used when no config file is given; the compose deployment runs entirely
/// on defaults plus environment wiring.
pub fn load_default() -> Result<ProxyConfig, ConfigError> {
    let mut config = ProxyConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Environment overrides for container deployments:
///
/// - `PROXY_BIND_ADDRESS` replaces the listener bind address.
/// - `PROXY_LOG_LEVEL` replaces the log level.
/// - `PROXY_UPSTREAM_<NAME>_ADDRESS` replaces the server list of the named
///   upstream with a single server at that address (comma-separated for
///   several servers).
fn apply_env_overrides(config: &mut ProxyConfig) {
    if let Ok(addr) = std::env::var("PROXY_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Ok(level) = std::env::var("PROXY_LOG_LEVEL") {
        config.observability.log_level = level;
    }

    for upstream in &mut config.upstreams {
        let var = format!(
            "PROXY_UPSTREAM_{}_ADDRESS",
            upstream.name.to_uppercase().replace('-', "_")
        );
        if let Ok(addresses) = std::env::var(var) {
            let template = upstream.servers.first().cloned();
            upstream.servers = addresses
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(|address| {
                    let mut server = template.clone().unwrap_or_else(|| {
                        crate::config::schema::ServerConfig {
                            address: String::new(),
                            weight: 1,
                            max_connections: 1024,
                        }
                    });
                    server.address = address.to_string();
                    server
                })
                .collect();
        }
    }
}
