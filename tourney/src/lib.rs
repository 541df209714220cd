//! # Tourney
//!
//! A single-elimination bracket tournament engine for any number of
//! participants.
//!
//! The engine reconciles an arbitrary participant count with a binary
//! elimination tree, moves winners forward round by round, and arbitrates
//! between the three ways a match can be resolved:
//!
//! - **Organizer decision**: immediate and final
//! - **Reply timeout**: a participant who does not answer in time sends the
//!   match to a community vote
//! - **Vote**: the majority wins when the vote window closes, ties follow a
//!   configured [`TieBreakPolicy`]
//!
//! ## Core Modules
//!
//! - [`tournament`]: Data model, participant registry and error types
//! - [`bracket`]: Bracket Builder and Round Propagator
//! - [`lifecycle`]: Match lifecycle state machine, tournament actors and manager
//! - [`events`]: Outbound events for announcement collaborators
//! - [`store`]: Durable persistence (in-memory and PostgreSQL)
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use tourney::bracket::build_bracket;
//! use tourney::tournament::Tournament;
//!
//! let mut cup = Tournament::new("t1".to_string(), "Wordsmith Cup".to_string(), 0);
//! for (id, name) in [("u1", "Ada"), ("u2", "Brian"), ("u3", "Cleo"), ("u4", "Dev"), ("u5", "Eve")] {
//!     cup.register(id.to_string(), name.to_string(), Utc::now()).unwrap();
//! }
//!
//! let plan = build_bracket(&mut cup, Utc::now()).unwrap();
//! assert_eq!(plan.main_size, 4);
//! assert_eq!(plan.prelim_matches(), 1);
//! ```

/// Tournament data model, registry and errors.
pub mod tournament;
pub use tournament::{
    EngineError, EngineResult, Match, MatchState, Participant, Side, Tournament, TournamentStatus,
};

/// Bracket construction and round propagation.
pub mod bracket;
pub use bracket::{BracketPlan, build_bracket, propagate};

/// Match lifecycle controller.
pub mod lifecycle;
pub use lifecycle::{
    EngineSettings, LifecycleConfig, TieBreakPolicy, TournamentHandle, TournamentManager,
};

/// Outbound engine events.
pub mod events;
pub use events::{EngineEvent, EventEnvelope};

/// Tournament persistence.
pub mod store;
pub use store::{InMemoryStore, TournamentStore};
