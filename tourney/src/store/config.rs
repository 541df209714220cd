//! Database configuration for the PostgreSQL store.

use crate::tournament::ConfigurationError;
use std::{env, str::FromStr};

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,

    /// Maximum connection lifetime in seconds
    pub max_lifetime_secs: u64,
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigurationError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigurationError::Invalid {
            field: name,
            reason: format!("'{raw}' is not a valid number"),
        }),
        Err(_) => Ok(default),
    }
}

impl DatabaseConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
    /// - `DB_MIN_CONNECTIONS`: Minimum pool size (default: 1)
    /// - `DB_CONNECTION_TIMEOUT`: Connection timeout in seconds (default: 10)
    /// - `DB_IDLE_TIMEOUT`: Idle timeout in seconds (default: 600)
    /// - `DB_MAX_LIFETIME`: Max lifetime in seconds (default: 1800)
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - `DATABASE_URL` is not set, callers fall back to the in-memory store
    /// * `Err(ConfigurationError)` - A pool setting is not a valid number
    pub fn from_env() -> Result<Option<Self>, ConfigurationError> {
        let Ok(database_url) = env::var("DATABASE_URL") else {
            return Ok(None);
        };

        let defaults = Self::development();
        Ok(Some(Self {
            database_url,
            max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_var("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connection_timeout_secs: parse_var(
                "DB_CONNECTION_TIMEOUT",
                defaults.connection_timeout_secs,
            )?,
            idle_timeout_secs: parse_var("DB_IDLE_TIMEOUT", defaults.idle_timeout_secs)?,
            max_lifetime_secs: parse_var("DB_MAX_LIFETIME", defaults.max_lifetime_secs)?,
        }))
    }

    /// Create a default configuration for development
    ///
    /// Uses `postgres://postgres@localhost/tourney` as the database URL
    pub fn development() -> Self {
        Self {
            database_url: "postgres://postgres@localhost/tourney".to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}
