//! Runtime Configuration
//!
//! All settings come from `SHADOW_STRIKE_*` environment variables with
//! defaults suitable for local play. Malformed values are errors, never
//! silently replaced by defaults.
//!
//! | Variable                            | Default        |
//! |-------------------------------------|----------------|
//! | `SHADOW_STRIKE_BIND_ADDR`           | `0.0.0.0:8080` |
//! | `SHADOW_STRIKE_MAX_CONNECTIONS`     | `1000`         |
//! | `SHADOW_STRIKE_IDLE_TIMEOUT_SECS`   | `300`          |
//! | `SHADOW_STRIKE_DECRYPT_TIMEOUT_MS`  | `10000`        |
//! | `SHADOW_STRIKE_ORACLE_LATENCY_MS`   | `0`            |
//! | `SHADOW_STRIKE_EVENT_CAPACITY`      | `256`          |
//! | `SHADOW_STRIKE_SEED`                | OS entropy     |
//! | `SHADOW_STRIKE_AUTH_*`              | see [`AuthConfig::from_env`] |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::battle::ArenaConfig;
use crate::fhe::CoprocessorConfig;
use crate::network::{AuthConfig, ServerConfig};

const PREFIX: &str = "SHADOW_STRIKE_";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        /// Full variable name.
        var: String,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// Complete process configuration.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// WebSocket front end.
    pub server: ServerConfig,
    /// Arena tuning.
    pub arena: ArenaConfig,
    /// Local encrypted-computation backend.
    pub coprocessor: CoprocessorConfig,
    /// Token verification.
    pub auth: AuthConfig,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::from_lookup(|name| std::env::var(name).ok())?;
        settings.auth = AuthConfig::from_env();
        Ok(settings)
    }

    /// Read settings through `lookup` (full variable name to value).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let mut settings = Self::default();

        if let Some(addr) = env.parse::<SocketAddr>("BIND_ADDR")? {
            settings.server.bind_addr = addr;
        }
        if let Some(max) = env.parse::<usize>("MAX_CONNECTIONS")? {
            settings.server.max_connections = max;
        }
        if let Some(secs) = env.parse::<u64>("IDLE_TIMEOUT_SECS")? {
            settings.server.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env.parse::<u64>("DECRYPT_TIMEOUT_MS")? {
            settings.arena.decrypt_timeout = Duration::from_millis(ms);
        }
        if let Some(capacity) = env.parse::<usize>("EVENT_CAPACITY")? {
            settings.arena.event_capacity = capacity;
        }
        if let Some(ms) = env.parse::<u64>("ORACLE_LATENCY_MS")? {
            settings.coprocessor.decrypt_latency = Duration::from_millis(ms);
        }
        match env.seed("SEED")? {
            Some(seed) => settings.coprocessor.seed = seed,
            None => warn!(
                "{PREFIX}SEED not set; using a random backend seed, \
                 sealed attributes will not be reproducible across restarts"
            ),
        }

        Ok(settings)
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn raw(&self, key: &str) -> Option<(String, String)> {
        let var = format!("{PREFIX}{key}");
        (self.lookup)(&var).map(|value| (var, value))
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some((var, value)) = self.raw(key) else {
            return Ok(None);
        };
        value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid { var, value: value.clone(), reason: e.to_string() })
    }

    fn seed(&self, key: &str) -> Result<Option<[u8; 32]>, ConfigError> {
        let Some((var, value)) = self.raw(key) else {
            return Ok(None);
        };
        let trimmed = value.trim();
        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let invalid = |reason: String| ConfigError::Invalid {
            var: var.clone(),
            value: value.clone(),
            reason,
        };
        let bytes = hex::decode(hex_str).map_err(|e| invalid(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| invalid(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Some(seed))
    }
}
