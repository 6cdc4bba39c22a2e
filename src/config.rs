//! Relay configuration parsed from environment variables.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub heartbeat_interval: Duration,
    /// Directory holding the browser client. `None` serves only the relay.
    pub static_dir: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            static_dir: None,
        }
    }
}

impl RelayConfig {
    /// Build typed relay config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `BIND_ADDR`: default `0.0.0.0`
    /// - `HEARTBEAT_INTERVAL_SECS`: default 30
    /// - `STATIC_DIR`: unset disables static asset serving
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but does not parse, or the
    /// heartbeat interval is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env_parse("PORT", DEFAULT_PORT)?;
        let bind_addr = env_parse("BIND_ADDR", IpAddr::from([0, 0, 0, 0]))?;

        let heartbeat_secs = env_parse("HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_INTERVAL_SECS)?;
        if heartbeat_secs == 0 {
            return Err(ConfigError::Zero { var: "HEARTBEAT_INTERVAL_SECS" });
        }

        let static_dir = std::env::var("STATIC_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bind_addr,
            port,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            static_dir,
        })
    }
}

/// Parse an optional env var, falling back to `default` when unset or empty.
fn env_parse<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value }),
        _ => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
