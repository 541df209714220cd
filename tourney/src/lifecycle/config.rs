//! Engine settings: lifecycle timings, channel bindings and organizer roles.
//!
//! Settings are owned by the embedding application. The engine reads them
//! and never writes them back.

use crate::tournament::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tokio::sync::RwLock;

/// How a tied vote (including a vote with no ballots) is decided
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    /// Slot P1 wins
    #[default]
    FavorPlayerOne,
    /// Whoever registered first wins
    FavorEarlierRegistrant,
    /// Coin flip
    Random,
}

impl fmt::Display for TieBreakPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieBreakPolicy::FavorPlayerOne => write!(f, "favor_player_one"),
            TieBreakPolicy::FavorEarlierRegistrant => write!(f, "favor_earlier_registrant"),
            TieBreakPolicy::Random => write!(f, "random"),
        }
    }
}

impl FromStr for TieBreakPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "favor_player_one" | "p1" => Ok(TieBreakPolicy::FavorPlayerOne),
            "favor_earlier_registrant" | "earlier" => Ok(TieBreakPolicy::FavorEarlierRegistrant),
            "random" => Ok(TieBreakPolicy::Random),
            other => Err(ConfigurationError::Invalid {
                field: "tie_break",
                reason: format!("unknown policy '{other}'"),
            }),
        }
    }
}

/// Match lifecycle timings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Time a participant has to answer the opponent's post (default: 24h)
    pub reply_timeout_secs: u64,

    /// Default vote window length (default: 24h)
    pub vote_window_secs: u64,

    /// Accepted posts, both sides combined, before the match goes to a vote
    /// (default: 6, three exchanges per side)
    pub reply_threshold: u32,

    /// Tie-break policy for vote tallies
    pub tie_break: TieBreakPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            reply_timeout_secs: 24 * 60 * 60,
            vote_window_secs: 24 * 60 * 60,
            reply_threshold: 6,
            tie_break: TieBreakPolicy::default(),
        }
    }
}

impl LifecycleConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.reply_timeout_secs == 0 {
            return Err(ConfigurationError::Invalid {
                field: "reply_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.vote_window_secs == 0 {
            return Err(ConfigurationError::Invalid {
                field: "vote_window_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.reply_threshold == 0 {
            return Err(ConfigurationError::Invalid {
                field: "reply_threshold",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    pub fn vote_window(&self) -> Duration {
        Duration::from_secs(self.vote_window_secs)
    }
}

/// Channel bindings of the messaging collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBindings {
    pub bracket: Option<String>,
    pub registration: Option<String>,
    pub announce: Option<String>,
    pub vote: Option<String>,
    /// Channels matches are played in, assigned round-robin
    pub battle_channels: Vec<String>,
}

impl ChannelBindings {
    /// Look up a named binding, failing with the binding name when unset
    pub fn require(&self, name: &'static str) -> Result<&str, ConfigurationError> {
        let binding = match name {
            "bracket" => &self.bracket,
            "registration" => &self.registration,
            "announce" => &self.announce,
            "vote" => &self.vote,
            _ => &None,
        };
        binding
            .as_deref()
            .ok_or(ConfigurationError::MissingChannel(name))
    }

    /// Rebind a named channel, `None` clears it
    pub fn set(&mut self, name: &str, channel_id: Option<String>) -> Result<(), ConfigurationError> {
        let binding = match name {
            "bracket" => &mut self.bracket,
            "registration" => &mut self.registration,
            "announce" => &mut self.announce,
            "vote" => &mut self.vote,
            other => {
                return Err(ConfigurationError::Invalid {
                    field: "channel",
                    reason: format!("unknown binding '{other}'"),
                });
            }
        };
        *binding = channel_id.filter(|id| !id.trim().is_empty());
        Ok(())
    }
}

/// Settings shared between the manager and its actors.
///
/// Readers clone the inner `Arc` and work on that snapshot; an update swaps
/// in a new snapshot, so a command in flight never sees half an update.
pub type SharedSettings = Arc<RwLock<Arc<EngineSettings>>>;

/// Everything the engine consults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub lifecycle: LifecycleConfig,
    pub channels: ChannelBindings,
    /// Roles allowed to issue organizer commands
    pub organizer_roles: Vec<String>,
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.lifecycle.validate()
    }

    pub fn into_shared(self) -> SharedSettings {
        Arc::new(RwLock::new(Arc::new(self)))
    }

    /// Whether any of `roles` is an organizer role.
    ///
    /// Fails when no organizer role is configured at all, so a missing
    /// binding never silently grants or denies everyone.
    pub fn is_organizer<S: AsRef<str>>(&self, roles: &[S]) -> Result<bool, ConfigurationError> {
        if self.organizer_roles.is_empty() {
            return Err(ConfigurationError::NoOrganizerRoles);
        }

        Ok(roles
            .iter()
            .any(|role| self.organizer_roles.iter().any(|r| r == role.as_ref())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.reply_timeout(), Duration::from_secs(86_400));
        assert_eq!(config.vote_window(), Duration::from_secs(86_400));
        assert_eq!(config.reply_threshold, 6);
        assert_eq!(config.tie_break, TieBreakPolicy::FavorPlayerOne);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = LifecycleConfig {
            reply_threshold: 0,
            ..LifecycleConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Invalid { field: "reply_threshold", .. })
        ));

        let config = LifecycleConfig {
            vote_window_secs: 0,
            ..LifecycleConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tie_break_parsing() {
        assert_eq!("random".parse::<TieBreakPolicy>(), Ok(TieBreakPolicy::Random));
        assert_eq!(
            "favor-earlier-registrant".parse::<TieBreakPolicy>(),
            Ok(TieBreakPolicy::FavorEarlierRegistrant)
        );
        assert!("coin".parse::<TieBreakPolicy>().is_err());
    }

    #[test]
    fn test_organizer_roles() {
        let mut settings = EngineSettings::default();
        assert_eq!(
            settings.is_organizer(&["admin"]),
            Err(ConfigurationError::NoOrganizerRoles)
        );

        settings.organizer_roles = vec!["Organizer".to_string()];
        assert_eq!(settings.is_organizer(&["member", "Organizer"]), Ok(true));
        assert_eq!(settings.is_organizer(&["member"]), Ok(false));
    }

    #[test]
    fn test_set_channel() {
        let mut channels = ChannelBindings::default();
        channels.set("announce", Some("news".to_string())).unwrap();
        assert_eq!(channels.require("announce"), Ok("news"));

        channels.set("announce", Some("  ".to_string())).unwrap();
        assert_eq!(
            channels.require("announce"),
            Err(ConfigurationError::MissingChannel("announce"))
        );

        assert!(matches!(
            channels.set("battle", Some("arena".to_string())),
            Err(ConfigurationError::Invalid { field: "channel", .. })
        ));
    }

    #[test]
    fn test_require_channel() {
        let channels = ChannelBindings {
            vote: Some("votes".to_string()),
            ..ChannelBindings::default()
        };
        assert_eq!(channels.require("vote"), Ok("votes"));
        assert_eq!(
            channels.require("announce"),
            Err(ConfigurationError::MissingChannel("announce"))
        );
    }
}
