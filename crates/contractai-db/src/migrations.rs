//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time. They run sequentially,
//! tracked by the `_contractai_migrations` table. Each migration runs
//! exactly once — if it has already been applied, it is skipped.

use chrono::Utc;
use sqlx::{AnyConnection, Connection};
use thiserror::Error;

use crate::pool::DbPool;

/// A single embedded migration.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_users",
        sql: include_str!("migrations/001_users.sql"),
    },
    Migration {
        name: "002_documents",
        sql: include_str!("migrations/002_documents.sql"),
    },
    Migration {
        name: "003_document_analyses",
        sql: include_str!("migrations/003_document_analyses.sql"),
    },
    Migration {
        name: "004_clauses",
        sql: include_str!("migrations/004_clauses.sql"),
    },
    Migration {
        name: "005_clause_risks",
        sql: include_str!("migrations/005_clause_risks.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// The name of the migration that failed.
        name: String,
        /// The underlying driver error.
        source: sqlx::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(sqlx::Error),

    /// Failed to check a connection out of the pool for the bootstrap.
    #[error("failed to acquire a connection for schema bootstrap: {0}")]
    Acquire(sqlx::Error),
}

/// Runs all pending migrations on the given connection.
///
/// Migrations that have already been applied (tracked in
/// `_contractai_migrations`) are skipped. New migrations run in order,
/// each inside its own transaction, and are recorded on success.
///
/// # Errors
///
/// Returns `MigrationError` if any migration fails to execute or if the
/// tracking table cannot be queried.
pub async fn run_migrations(conn: &mut AnyConnection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS).await
}

/// Creates the full schema on an empty database by running every pending
/// migration through one pooled connection.
///
/// This is the bootstrap path for development, tests, and server startup
/// against a disposable database. Production deployments apply migrations
/// as an explicit, reviewed deploy step instead of relying on whatever
/// binary happens to start first.
pub async fn init_db(pool: &DbPool) -> Result<usize, MigrationError> {
    let mut conn = pool.acquire().await.map_err(MigrationError::Acquire)?;
    run_migrations(&mut conn).await
}

async fn run_migrations_from_list(
    conn: &mut AnyConnection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS _contractai_migrations (
            name       TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .execute(&mut *conn)
    .await
    .map_err(|e| MigrationError::ExecutionFailed {
        name: "_contractai_migrations_bootstrap".to_string(),
        source: e,
    })?;

    let mut applied = 0;

    for migration in migrations {
        let already_applied: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM _contractai_migrations WHERE name = $1")
                .bind(migration.name)
                .fetch_one(&mut *conn)
                .await
                .map_err(MigrationError::StateQuery)?;

        if already_applied > 0 {
            tracing::debug!(
                migration = migration.name,
                "migration already applied, skipping"
            );
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");

        let mut tx = conn
            .begin()
            .await
            .map_err(|e| MigrationError::ExecutionFailed {
                name: migration.name.to_string(),
                source: e,
            })?;

        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| MigrationError::ExecutionFailed {
                name: migration.name.to_string(),
                source: e,
            })?;

        sqlx::query("INSERT INTO _contractai_migrations (name, applied_at) VALUES ($1, $2)")
            .bind(migration.name)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| MigrationError::ExecutionFailed {
                name: migration.name.to_string(),
                source: e,
            })?;

        tx.commit()
            .await
            .map_err(|e| MigrationError::ExecutionFailed {
                name: migration.name.to_string(),
                source: e,
            })?;

        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, PoolSettings};

    async fn fresh_db() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("contractai.db").display()
        );
        let pool = create_pool(&url, PoolSettings::default())
            .await
            .expect("should create pool");
        (dir, pool)
    }

    #[tokio::test]
    async fn run_migrations_on_fresh_db() {
        let (_dir, pool) = fresh_db().await;
        let applied = init_db(&pool).await.expect("migrations should succeed");
        assert_eq!(applied, 5, "should apply every table migration");

        let mut conn = pool.acquire().await.expect("should get a connection");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _contractai_migrations")
            .fetch_one(&mut *conn)
            .await
            .expect("should query migration count");
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn run_migrations_idempotent() {
        let (_dir, pool) = fresh_db().await;

        let first = init_db(&pool).await.expect("first run should succeed");
        assert_eq!(first, 5);

        let second = init_db(&pool).await.expect("second run should succeed");
        assert_eq!(second, 0, "no new migrations to apply");
    }

    #[tokio::test]
    async fn all_schema_tables_exist() {
        let (_dir, pool) = fresh_db().await;
        init_db(&pool).await.expect("migrations should succeed");

        let mut conn = pool.acquire().await.expect("should get a connection");
        for table in [
            "users",
            "documents",
            "document_analyses",
            "clauses",
            "clause_risks",
        ] {
            let exists: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
            )
            .bind(table)
            .fetch_one(&mut *conn)
            .await
            .expect("should query sqlite_master");
            assert_eq!(exists, 1, "table {table} should exist");
        }
    }

    #[tokio::test]
    async fn failed_migration_rolls_back_and_is_not_recorded() {
        let (_dir, pool) = fresh_db().await;
        let mut conn = pool.acquire().await.expect("should get a connection");

        let migrations = [Migration {
            name: "900_broken",
            sql: "CREATE TABLE rollback_probe (id TEXT PRIMARY KEY);
                  CREATE TABLE rollback_probe (id TEXT PRIMARY KEY);",
        }];

        let err = run_migrations_from_list(&mut conn, &migrations)
            .await
            .expect_err("duplicate table creation should fail");
        match err {
            MigrationError::ExecutionFailed { name, .. } => assert_eq!(name, "900_broken"),
            other => panic!("unexpected error type: {other:?}"),
        }

        let probe: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'rollback_probe'",
        )
        .fetch_one(&mut *conn)
        .await
        .expect("should query sqlite_master");
        assert_eq!(probe, 0, "schema side effects should be rolled back");

        let recorded: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM _contractai_migrations WHERE name = $1")
                .bind("900_broken")
                .fetch_one(&mut *conn)
                .await
                .expect("should query tracking table");
        assert_eq!(recorded, 0, "failed migration must not be recorded");
    }
}
