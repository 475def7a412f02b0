//! Process configuration read from environment variables.
//!
//! | Variable                    | Required | Default        |
//! |-----------------------------|----------|----------------|
//! | `DATABASE_URL`              | yes      |                |
//! | `TOKEN`                     | yes      |                |
//! | `PROXY_BIND`                | no       | `0.0.0.0:3000` |
//! | `CACHE_SWEEP_INTERVAL_SECS` | no       | disabled       |
//! | `MAX_REQUEST_BYTES`         | no       | 8 MiB          |
//!
//! A sweep interval of `0` disables sweeping. Any other value must be at
//! least [`MIN_SWEEP_INTERVAL`]; shorter periods trip the cache's
//! ten-per-minute overuse warning on every tick.

use std::time::Duration;

use thiserror::Error;

use crate::server::DEFAULT_MAX_REQUEST_BYTES;

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Shortest accepted `CACHE_SWEEP_INTERVAL_SECS`.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(6);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),

    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Connection string of the backing engine.
    pub database_url: String,
    /// Shared secret expected in `Authorization: Bearer`.
    pub token: String,
    pub bind: String,
    /// `None` leaves expired entries to lazy eviction only.
    pub sweep_interval: Option<Duration>,
    pub max_request_bytes: usize,
}

impl ProxyConfig {
    /// Reads the config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let database_url = required("DATABASE_URL")?;
        if !database_url.contains("://") {
            return Err(ConfigError::Invalid {
                name: "DATABASE_URL",
                value: database_url,
                reason: "expected a scheme://... connection string",
            });
        }
        let token = required("TOKEN")?;

        let bind = lookup("PROXY_BIND")
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND.to_owned());

        let sweep_interval = match parse_number(&lookup, "CACHE_SWEEP_INTERVAL_SECS")? {
            None | Some(0) => None,
            Some(secs) if Duration::from_secs(secs) < MIN_SWEEP_INTERVAL => {
                return Err(ConfigError::Invalid {
                    name: "CACHE_SWEEP_INTERVAL_SECS",
                    value: secs.to_string(),
                    reason: "must be 0 or at least 6 seconds",
                });
            }
            Some(secs) => Some(Duration::from_secs(secs)),
        };

        let max_request_bytes = match parse_number(&lookup, "MAX_REQUEST_BYTES")? {
            None => DEFAULT_MAX_REQUEST_BYTES,
            Some(0) => {
                return Err(ConfigError::Invalid {
                    name: "MAX_REQUEST_BYTES",
                    value: "0".to_owned(),
                    reason: "must be greater than zero",
                });
            }
            Some(n) => usize::try_from(n).map_err(|_| ConfigError::Invalid {
                name: "MAX_REQUEST_BYTES",
                value: n.to_string(),
                reason: "does not fit in memory",
            })?,
        };

        Ok(Self {
            database_url,
            token,
            bind,
            sweep_interval,
            max_request_bytes,
        })
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("database_url", &"<redacted>")
            .field("token", &"<redacted>")
            .field("bind", &self.bind)
            .field("sweep_interval", &self.sweep_interval)
            .field("max_request_bytes", &self.max_request_bytes)
            .finish()
    }
}

fn parse_number<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse().map(Some).map_err(|_| ConfigError::Invalid {
        name,
        value: raw,
        reason: "expected a non-negative integer",
    })
}
