//! Process configuration, read from `ASSETLOG_*` environment variables.

use std::net::SocketAddr;

use assetlog_db::DbConfig;
use assetlog_engine::{EngineConfig, MAX_REVERT_WINDOW_SECS};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address. Default: `127.0.0.1:8080`.
    pub bind_addr: SocketAddr,
    pub db: DbConfig,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db: DbConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the process environment. Unset variables keep their
    /// defaults; malformed ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("ASSETLOG_BIND") {
            config.bind_addr = parse("ASSETLOG_BIND", value)?;
        }
        if let Some(url) = lookup("ASSETLOG_DB_URL") {
            config.db.url = url;
        }
        if let Some(namespace) = lookup("ASSETLOG_DB_NAMESPACE") {
            config.db.namespace = namespace;
        }
        if let Some(database) = lookup("ASSETLOG_DB_DATABASE") {
            config.db.database = database;
        }
        config.db.username = lookup("ASSETLOG_DB_USER");
        config.db.password = lookup("ASSETLOG_DB_PASSWORD");
        if let Some(value) = lookup("ASSETLOG_REVERT_WINDOW_SECS") {
            let secs: u64 = parse("ASSETLOG_REVERT_WINDOW_SECS", value.clone())?;
            if secs == 0 || secs > MAX_REVERT_WINDOW_SECS {
                return Err(ConfigError::Invalid {
                    var: "ASSETLOG_REVERT_WINDOW_SECS",
                    value,
                    reason: format!("must be between 1 and {MAX_REVERT_WINDOW_SECS}"),
                });
            }
            config.engine.revert_window_secs = secs;
        }

        Ok(config)
    }
}

fn parse<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}
