//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use tourney::{
    lifecycle::{ChannelBindings, EngineSettings, LifecycleConfig, TieBreakPolicy},
    store::DatabaseConfig,
    tournament::ConfigurationError,
};

const SECS_PER_HOUR: u64 = 60 * 60;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus exporter bind address, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Database configuration, `None` runs on the in-memory store
    pub database: Option<DatabaseConfig>,
    /// Settings handed to the engine
    pub engine: EngineSettings,
    /// Tournament created on first start when none is current
    pub default_tournament: DefaultTournamentConfig,
    /// Whether organizer command routes are mounted
    pub organizer_routes: bool,
}

/// Tournament created when the store has no current tournament
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultTournamentConfig {
    pub name: String,
    /// Participant cap, 0 for unlimited
    pub max_participants: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr("SERVER_BIND")?.unwrap_or_else(default_bind),
        };
        let metrics_bind = parse_addr("METRICS_BIND")?;

        let database = match (DatabaseConfig::from_env()?, database_url_override) {
            (Some(config), Some(database_url)) => Some(DatabaseConfig {
                database_url,
                ..config
            }),
            (None, Some(database_url)) => Some(DatabaseConfig {
                database_url,
                ..DatabaseConfig::development()
            }),
            (config, None) => config,
        };

        let defaults = LifecycleConfig::default();
        let tie_break = match std::env::var("TIE_BREAK") {
            Ok(raw) => raw.parse::<TieBreakPolicy>()?,
            Err(_) => defaults.tie_break,
        };
        let lifecycle = LifecycleConfig {
            reply_timeout_secs: parse_env_or(
                "REPLY_TIMEOUT_HOURS",
                defaults.reply_timeout_secs / SECS_PER_HOUR,
            ) * SECS_PER_HOUR,
            vote_window_secs: parse_env_or(
                "VOTE_WINDOW_HOURS",
                defaults.vote_window_secs / SECS_PER_HOUR,
            ) * SECS_PER_HOUR,
            reply_threshold: parse_env_or("REPLY_THRESHOLD", defaults.reply_threshold),
            tie_break,
        };

        let channels = ChannelBindings {
            bracket: std::env::var("BRACKET_CHANNEL").ok(),
            registration: std::env::var("REGISTRATION_CHANNEL").ok(),
            announce: std::env::var("ANNOUNCE_CHANNEL").ok(),
            vote: std::env::var("VOTE_CHANNEL").ok(),
            battle_channels: parse_list("BATTLE_CHANNELS"),
        };

        let engine = EngineSettings {
            lifecycle,
            channels,
            organizer_roles: parse_list("ORGANIZER_ROLES"),
        };

        let default_tournament = DefaultTournamentConfig {
            name: std::env::var("DEFAULT_TOURNAMENT_NAME")
                .unwrap_or_else(|_| "Tournament".to_string()),
            max_participants: parse_env_or("MAX_PARTICIPANTS", 0),
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            database,
            engine,
            default_tournament,
            organizer_routes: parse_env_or("ORGANIZER_ROUTES", true),
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;

        if self.organizer_routes && self.engine.organizer_roles.is_empty() {
            return Err(ConfigError::Invalid {
                var: "ORGANIZER_ROLES".to_string(),
                reason: "Must name at least one role while organizer routes are enabled"
                    .to_string(),
            });
        }

        if self.default_tournament.max_participants == 1 {
            return Err(ConfigError::Invalid {
                var: "MAX_PARTICIPANTS".to_string(),
                reason: "Must be 0 (unlimited) or at least 2".to_string(),
            });
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server address ({})", self.bind),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },

    #[error(transparent)]
    Engine(#[from] ConfigurationError),
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6969))
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_addr(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("'{raw}' is not a socket address"),
        }),
        Err(_) => Ok(None),
    }
}

/// Comma separated list, blanks dropped
fn parse_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            metrics_bind: None,
            database: None,
            engine: EngineSettings {
                organizer_roles: vec!["organizer".to_string()],
                ..EngineSettings::default()
            },
            default_tournament: DefaultTournamentConfig {
                name: "Weekly".to_string(),
                max_participants: 0,
            },
            organizer_routes: true,
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "SERVER_BIND".to_string(),
            reason: "bad".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SERVER_BIND"));
        assert!(msg.contains("bad"));

        let err = ConfigError::from(ConfigurationError::NoOrganizerRoles);
        assert_eq!(err.to_string(), "no organizer roles configured");
    }

    #[test]
    fn test_config_validation_ok() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_requires_roles() {
        let mut config = config();
        config.engine.organizer_roles.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { var, .. }) if var == "ORGANIZER_ROLES"
        ));

        config.organizer_routes = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_threshold() {
        let mut config = config();
        config.engine.lifecycle.reply_threshold = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Engine(_))));
    }

    #[test]
    fn test_config_validation_single_seat() {
        let mut config = config();
        config.default_tournament.max_participants = 1;
        assert!(config.validate().is_err());
    }
}
