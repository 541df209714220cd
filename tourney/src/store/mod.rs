//! Durable persistence of tournament aggregates.
//!
//! The engine only talks to [`TournamentStore`]. Two implementations ship with
//! the crate:
//! - [`InMemoryStore`] for tests and database-less deployments
//! - [`PgTournamentStore`], one JSONB aggregate row per tournament
//!
//! Saving an unchanged aggregate is a no-op in both, and an aggregate is
//! always written as a single value so a partial write can never leave a
//! half-updated bracket behind.

use crate::tournament::{Tournament, TournamentId};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod memory;
pub mod postgres;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use memory::InMemoryStore;
pub use postgres::{Database, PgTournamentStore};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tournament {0} not found in store")]
    NotFound(TournamentId),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode tournament: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable key-value store of tournament aggregates plus the "current" pointer
#[async_trait]
pub trait TournamentStore: Send + Sync {
    /// Load one aggregate
    async fn load(&self, id: &str) -> StoreResult<Tournament>;

    /// Insert or replace an aggregate
    async fn save(&self, tournament: &Tournament) -> StoreResult<()>;

    /// IDs of every stored tournament, oldest first
    async fn list_ids(&self) -> StoreResult<Vec<TournamentId>>;

    /// Tournament that commands resolve to when none is named
    async fn current(&self) -> StoreResult<Option<TournamentId>>;

    /// Move the "current" pointer
    async fn set_current(&self, id: &str) -> StoreResult<()>;

    /// Check that the backing storage is reachable
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
