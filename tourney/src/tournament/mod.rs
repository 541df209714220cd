//! Tournament aggregate, error taxonomy and participant registry.
//!
//! This module provides:
//! - The tournament data model (participants, rounds, matches)
//! - Tagged per-state match records ([`MatchState`])
//! - Registration and unregistration with capacity and status gating
//! - The error types returned by every engine operation
//!
//! ## Example
//!
//! ```
//! use tourney::tournament::{RegistrationError, Tournament};
//! use chrono::Utc;
//!
//! let mut cup = Tournament::new("t1".to_string(), "Wordsmith Cup".to_string(), 2);
//! cup.register("u1".to_string(), "Ada".to_string(), Utc::now()).unwrap();
//! cup.register("u2".to_string(), "Brian".to_string(), Utc::now()).unwrap();
//!
//! let full = cup.register("u3".to_string(), "Cleo".to_string(), Utc::now());
//! assert_eq!(full.unwrap_err(), RegistrationError::Full { max: 2 });
//! ```

pub mod errors;
pub mod models;
pub mod registry;

pub use errors::{
    BuildError, ConfigurationError, EngineError, EngineResult, MatchError, RegistrationError,
};
pub use models::{
    Fixture, Match, MatchId, MatchState, MatchStatus, Participant, ParticipantId, Resolution,
    Round, Side, Tournament, TournamentId, TournamentStatus, TournamentSummary, VoteReason,
};
