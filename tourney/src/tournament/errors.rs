//! Error taxonomy for the bracket engine.
//!
//! Every rejected operation maps to a specific variant so callers can show the
//! participant or organizer an actionable reason.

use super::models::{MatchId, ParticipantId, Side, TournamentId, TournamentStatus};
use crate::store::StoreError;
use thiserror::Error;

/// Participant registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("registration is closed")]
    Closed,

    #[error("tournament is full ({max} participants)")]
    Full { max: usize },

    #[error("already registered")]
    AlreadyRegistered,

    #[error("not registered")]
    NotRegistered,
}

/// Bracket construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("not enough participants: need at least 2, have {count}")]
    InsufficientParticipants { count: usize },
}

/// Match lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("match not found: {0}")]
    NotFound(MatchId),

    #[error("invalid winner '{0}' (use p1 or p2)")]
    InvalidWinnerToken(String),

    #[error("match {0} has already been decided")]
    AlreadyDecided(MatchId),

    #[error("not your turn, wait for your opponent to reply")]
    NotYourTurn,

    #[error("{0} is not playing in this match")]
    NotParticipant(ParticipantId),

    #[error("match {0} is still waiting for an opponent")]
    AwaitingOpponent(MatchId),

    #[error("no participant in slot {0}")]
    EmptySlot(Side),

    #[error("voting is not open for match {0}")]
    VoteNotOpen(MatchId),

    #[error("you already voted")]
    AlreadyVoted,

    #[error("a vote is already running for match {0}")]
    AlreadyVoting(MatchId),
}

/// Missing or invalid settings consulted by the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no battle channels configured")]
    NoBattleChannels,

    #[error("no {0} channel configured")]
    MissingChannel(&'static str),

    #[error("no organizer roles configured")]
    NoOrganizerRoles,

    #[error("invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Umbrella error returned by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("bracket build failed: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("no current tournament")]
    NoCurrentTournament,

    #[error("tournament not in correct state: expected {expected:?}, got {actual:?}")]
    InvalidState {
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    #[error("round {0} does not exist")]
    RoundNotFound(usize),

    #[error("tournament {0} is no longer accepting commands")]
    ActorUnavailable(TournamentId),
}

impl EngineError {
    /// Message safe to show to participants and organizers.
    ///
    /// Store failures are collapsed so database details never leak.
    pub fn client_message(&self) -> String {
        match self {
            EngineError::Store(StoreError::NotFound(_)) => "Tournament not found".to_string(),
            EngineError::Store(_) => "Internal server error".to_string(),
            EngineError::ActorUnavailable(_) => "Tournament is unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_actionable() {
        assert_eq!(MatchError::NotYourTurn.to_string(), "not your turn, wait for your opponent to reply");
        assert_eq!(
            RegistrationError::Full { max: 8 }.to_string(),
            "tournament is full (8 participants)"
        );
        assert_eq!(
            MatchError::InvalidWinnerToken("p3".to_string()).to_string(),
            "invalid winner 'p3' (use p1 or p2)"
        );
    }

    #[test]
    fn test_client_message_hides_store_details() {
        let err = EngineError::Store(StoreError::Timeout(std::time::Duration::from_secs(5)));
        assert_eq!(err.client_message(), "Internal server error");

        let err = EngineError::from(MatchError::AlreadyVoted);
        assert_eq!(err.client_message(), "you already voted");
    }
}
