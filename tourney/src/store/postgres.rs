//! PostgreSQL [`TournamentStore`]: one JSONB aggregate row per tournament.

use super::{
    DatabaseConfig, StoreError, StoreResult, TournamentStore,
    timeouts::{LONG_OPERATION_TIMEOUT, SAVE_TIMEOUT, with_default_timeout, with_timeout},
};
use crate::tournament::{Tournament, TournamentId};
use async_trait::async_trait;
use sqlx::{
    Row,
    postgres::{PgPool, PgPoolOptions},
};
use std::time::Duration;

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS tournaments (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        aggregate JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS engine_pointers (
        name TEXT PRIMARY KEY,
        tournament_id TEXT NOT NULL REFERENCES tournaments (id)
    )",
];

const CURRENT_POINTER: &str = "current";

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tourney::store::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let config = DatabaseConfig::development();
    ///     let db = Database::new(&config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// PostgreSQL implementation of [`TournamentStore`]
pub struct PgTournamentStore {
    pool: PgPool,
}

impl PgTournamentStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Create the tables if they do not exist yet
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            with_timeout(
                LONG_OPERATION_TIMEOUT,
                sqlx::query(statement).execute(&self.pool),
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TournamentStore for PgTournamentStore {
    async fn load(&self, id: &str) -> StoreResult<Tournament> {
        let row = with_default_timeout(
            sqlx::query("SELECT aggregate::text AS aggregate FROM tournaments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let raw: String = row.get("aggregate");
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, tournament: &Tournament) -> StoreResult<()> {
        let aggregate = serde_json::to_string(tournament)?;

        // Row is left untouched when the aggregate did not change
        let result = with_timeout(
            SAVE_TIMEOUT,
            sqlx::query(
                "INSERT INTO tournaments (id, status, aggregate, created_at)
                 VALUES ($1, $2, $3::jsonb, $4)
                 ON CONFLICT (id) DO UPDATE
                 SET status = EXCLUDED.status, aggregate = EXCLUDED.aggregate, updated_at = NOW()
                 WHERE tournaments.aggregate IS DISTINCT FROM EXCLUDED.aggregate",
            )
            .bind(&tournament.id)
            .bind(tournament.status.to_string())
            .bind(aggregate)
            .bind(tournament.created_at)
            .execute(&self.pool),
        )
        .await?;

        log::trace!(
            "Saved tournament {} ({} row(s) written)",
            tournament.id,
            result.rows_affected()
        );
        Ok(())
    }

    async fn list_ids(&self) -> StoreResult<Vec<TournamentId>> {
        let rows = with_timeout(
            LONG_OPERATION_TIMEOUT,
            sqlx::query("SELECT id FROM tournaments ORDER BY created_at, id").fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn current(&self) -> StoreResult<Option<TournamentId>> {
        let row = with_default_timeout(
            sqlx::query("SELECT tournament_id FROM engine_pointers WHERE name = $1")
                .bind(CURRENT_POINTER)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(|r| r.get("tournament_id")))
    }

    async fn set_current(&self, id: &str) -> StoreResult<()> {
        let exists = with_default_timeout(
            sqlx::query("SELECT 1 FROM tournaments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        with_default_timeout(
            sqlx::query(
                "INSERT INTO engine_pointers (name, tournament_id) VALUES ($1, $2)
                 ON CONFLICT (name) DO UPDATE SET tournament_id = EXCLUDED.tournament_id",
            )
            .bind(CURRENT_POINTER)
            .bind(id)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        with_default_timeout(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }
}
