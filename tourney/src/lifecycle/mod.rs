//! Match Lifecycle Controller with an async actor per tournament.
//!
//! This module implements:
//! - `machine`: pure per-match transitions (posts, votes, decisions, timeouts)
//! - `controller`: tournament-level operations that emit [`EngineEvent`]s
//! - `TournamentActor`: serializes every trigger for one tournament and owns
//!   its cancellable timers
//! - `TournamentManager`: spawns actors, tracks the current tournament and
//!   resumes persisted tournaments on start
//!
//! ## Architecture
//!
//! Each tournament runs in a separate Tokio task with an mpsc message inbox.
//! Commands, posts, votes and timer firings all pass through that inbox, so
//! at most one resolution path can finish a match. Timers carry the match
//! generation they were armed for; a firing for an older generation is a
//! no-op.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tourney::lifecycle::{EngineSettings, TournamentManager};
//! use tourney::store::InMemoryStore;
//!
//! # async fn example() -> Result<(), tourney::tournament::EngineError> {
//! let manager = TournamentManager::new(Arc::new(InMemoryStore::new()), EngineSettings::default())?;
//! let id = manager.ensure_current("Wordsmith Cup", 0).await?;
//!
//! manager.register(&id, "u1".to_string(), "Ada".to_string()).await?;
//! manager.register(&id, "u2".to_string(), "Brian".to_string()).await?;
//! let plan = manager.close_registration(&id).await?;
//! assert_eq!(plan.main_size, 2);
//! # Ok(())
//! # }
//! ```
//!
//! [`EngineEvent`]: crate::events::EngineEvent

pub mod actor;
pub mod config;
pub mod controller;
pub mod machine;
pub mod manager;
pub mod messages;

pub use actor::{TournamentActor, TournamentHandle};
pub use config::{ChannelBindings, EngineSettings, LifecycleConfig, SharedSettings, TieBreakPolicy};
pub use machine::{Transition, VoteTally};
pub use manager::TournamentManager;
pub use messages::{Reply, TimerKind, TournamentMessage};
