//! Query timeout helpers for the PostgreSQL store.
//!
//! Wraps sqlx futures so a stalled database surfaces as
//! [`StoreError::Timeout`] instead of blocking a tournament actor forever.

use super::StoreError;
use std::{future::Future, time::Duration};
use tokio::time::timeout;

/// Default timeout for single-row queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for aggregate upserts, which write a whole bracket (10 seconds)
pub const SAVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for startup work such as schema creation and full reloads (30 seconds)
pub const LONG_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Execute a query with timeout
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - sqlx operation to execute
///
/// # Returns
///
/// * `Result<T, StoreError>` - Query result, `Database` error or `Timeout`
///
/// # Example
///
/// ```no_run
/// use tourney::store::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
///
/// let rows = with_timeout(
///     DEFAULT_QUERY_TIMEOUT,
///     sqlx::query("SELECT id FROM tournaments").fetch_all(pool),
/// )
/// .await?;
///
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(StoreError::Database(e)),
        Err(_) => Err(StoreError::Timeout(duration)),
    }
}

/// Execute a query with the default timeout (5 seconds)
pub async fn with_default_timeout<F, T>(future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}
