//! Connection pool creation and scoped session acquisition.

use std::time::Duration;

use contractai_types::AppError;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use thiserror::Error;

/// Runtime tunables for the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Baseline number of pooled connections.
    pub pool_size: u32,

    /// Additional connections allowed beyond `pool_size` under load. The
    /// hard in-flight cap is `pool_size + max_overflow`.
    pub max_overflow: u32,

    /// Maximum wait for a connection when the pool is saturated. Requests
    /// beyond the cap block up to this long, then fail.
    pub acquire_timeout: Duration,

    /// Idle connections are closed after this long.
    pub idle_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            pool_size: 20,
            max_overflow: 10,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// A type alias for the async connection pool.
pub type DbPool = AnyPool;

/// A scoped database session. Dropping the value returns the underlying
/// connection to the pool, which is how release is guaranteed on success,
/// domain error, and panic alike.
pub type DbSession = sqlx::pool::PoolConnection<sqlx::Any>;

/// Errors that can occur when creating the database pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to build the connection pool or reach the database.
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] sqlx::Error),
}

/// Creates the connection pool for the given database URL.
///
/// The pool caps in-flight connections at `pool_size + max_overflow` and
/// runs a pre-flight liveness check on every checkout, so a connection
/// dropped by the server is replaced instead of handed to a session.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if the URL is malformed or the database
/// cannot be reached.
pub async fn create_pool(database_url: &str, settings: PoolSettings) -> Result<DbPool, PoolError> {
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(settings.pool_size + settings.max_overflow)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(Some(settings.idle_timeout))
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    tracing::debug!(
        max_connections = settings.pool_size + settings.max_overflow,
        "database connection pool created"
    );

    Ok(pool)
}

/// Acquires a scoped session for one logical operation.
///
/// Saturation surfaces as a database-kind [`AppError`] once the pool's
/// acquisition timeout elapses; any other checkout failure maps the same
/// way. Callers release the session by letting it drop.
pub async fn acquire(pool: &DbPool) -> Result<DbSession, AppError> {
    pool.acquire().await.map_err(|err| match err {
        sqlx::Error::PoolTimedOut => {
            AppError::database("timed out waiting for a connection from the pool")
        }
        other => AppError::database(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_in_memory_pool() {
        let settings = PoolSettings {
            pool_size: 2,
            max_overflow: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
        };

        let pool = create_pool("sqlite::memory:", settings)
            .await
            .expect("pool creation should succeed");

        let mut session = acquire(&pool).await.expect("should get a session");
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&mut *session)
            .await
            .expect("should run a query");
        assert_eq!(one, 1);
    }

    #[test]
    fn default_settings_match_the_documented_caps() {
        let settings = PoolSettings::default();
        assert_eq!(settings.pool_size, 20);
        assert_eq!(settings.max_overflow, 10);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(30));
    }
}
