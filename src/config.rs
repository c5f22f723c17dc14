//! Environment-driven runtime configuration.
//!
//! Everything the relay consumes from its surroundings is collected here
//! once at startup and passed down explicitly. Knobs:
//!
//! - `RELAY_BIND_ADDR` - listen address (default `0.0.0.0:3000`)
//! - `RELAY_NATS_URL` - broker connection URL (default `nats://127.0.0.1:4222`)
//! - `RELAY_REGISTRY_PATH` - service registry TOML file (required)
//! - `RELAY_RESOLVER_URL` - Identity Resolver base URL (optional; agent
//!   resolution is disabled when unset)
//! - `RELAY_RESOLVER_TIMEOUT_MS` - resolver request budget (default 500)
//! - `RELAY_RESOLVER_CACHE_TTL_SECS` - resolver cache TTL (default 30)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors while reading configuration from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Runtime configuration for the relay process.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub nats_url: String,
    pub registry_path: PathBuf,
    pub resolver_url: Option<String>,
    pub resolver_timeout: Duration,
    pub resolver_cache_ttl: Duration,
}

impl Config {
    /// Reads the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = parse_var(
            "RELAY_BIND_ADDR",
            std::env::var("RELAY_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        )?;

        let nats_url = std::env::var("RELAY_NATS_URL")
            .unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string());

        let registry_path = std::env::var("RELAY_REGISTRY_PATH")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingVar("RELAY_REGISTRY_PATH"))?;

        let resolver_url = std::env::var("RELAY_RESOLVER_URL").ok();

        let resolver_timeout = Duration::from_millis(match std::env::var("RELAY_RESOLVER_TIMEOUT_MS") {
            Ok(value) => parse_var("RELAY_RESOLVER_TIMEOUT_MS", value)?,
            Err(_) => 500,
        });

        let resolver_cache_ttl =
            Duration::from_secs(match std::env::var("RELAY_RESOLVER_CACHE_TTL_SECS") {
                Ok(value) => parse_var("RELAY_RESOLVER_CACHE_TTL_SECS", value)?,
                Err(_) => 30,
            });

        Ok(Config {
            bind_addr,
            nats_url,
            registry_path,
            resolver_url,
            resolver_timeout,
            resolver_cache_ttl,
        })
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}
