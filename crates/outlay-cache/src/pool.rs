//! Database connection pool management
//!
//! Wraps SQLx's `SqlitePool` with:
//! - Parent directory creation for file-backed databases
//! - WAL journal mode so CLI reads do not block daemon writes
//! - Schema migration tracked through `PRAGMA user_version`
//! - A single-connection in-memory mode for tests

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

/// Schema version written after the migrations below have run
const SCHEMA_VERSION: i64 = 1;

/// Migrations in order; entry `n` upgrades `user_version` from `n` to `n + 1`
const MIGRATIONS: &[&str] = &[include_str!("migrations/20261016_initial.sql")];

/// Manages a pool of SQLite connections for Outlay's local storage
///
/// The pool is configured with:
/// - WAL journal mode for concurrent read access
/// - 5 max connections for file-based databases
/// - 1 connection for in-memory databases (each connection would otherwise
///   see its own empty database)
/// - 5-second busy timeout to absorb write contention between the CLI and
///   the daemon
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database file at `db_path`
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the directory or connection
    /// cannot be created, or `CacheError::MigrationFailed` if the schema
    /// cannot be brought up to date.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to connect to database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(path = %db_path.display(), "Database pool initialized");

        Ok(Self { pool })
    }

    /// Creates an in-memory database pool for testing
    ///
    /// # Errors
    ///
    /// Same as [`DatabasePool::new`].
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory database pool initialized");

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Schema version currently recorded in the database
    pub async fn schema_version(&self) -> Result<i64, CacheError> {
        Self::user_version(&self.pool).await
    }

    /// Closes every connection, checkpointing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn user_version(pool: &SqlitePool) -> Result<i64, CacheError> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(pool)
            .await?;
        Ok(version)
    }

    /// Applies every migration newer than the stored `user_version`
    async fn run_migrations(pool: &SqlitePool) -> Result<(), CacheError> {
        let current = Self::user_version(pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;

        if current > SCHEMA_VERSION {
            return Err(CacheError::MigrationFailed(format!(
                "Database schema version {} is newer than supported version {}",
                current, SCHEMA_VERSION
            )));
        }

        for (index, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
            let target = index as i64 + 1;
            sqlx::raw_sql(sql).execute(pool).await.map_err(|e| {
                CacheError::MigrationFailed(format!("Failed to apply migration {}: {}", target, e))
            })?;
            // PRAGMA does not accept bound parameters
            sqlx::raw_sql(&format!("PRAGMA user_version = {}", target))
                .execute(pool)
                .await
                .map_err(|e| {
                    CacheError::MigrationFailed(format!(
                        "Failed to record schema version {}: {}",
                        target, e
                    ))
                })?;
            tracing::debug!(version = target, "Applied database migration");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_reaches_current_version() {
        let pool = DatabasePool::in_memory().await.unwrap();
        assert_eq!(pool.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_reopen_file_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("outlay.db");

        let first = DatabasePool::new(&path).await.unwrap();
        first.close().await;

        let second = DatabasePool::new(&path).await.unwrap();
        assert_eq!(second.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("outlay.db");

        let pool = DatabasePool::new(&path).await.unwrap();
        sqlx::raw_sql("PRAGMA user_version = 99")
            .execute(pool.pool())
            .await
            .unwrap();
        pool.close().await;

        match DatabasePool::new(&path).await {
            Err(CacheError::MigrationFailed(msg)) => assert!(msg.contains("99")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("newer schema should be rejected"),
        }
    }
}
