//! Outlay Cache - Local state persistence
//!
//! SQLite-backed storage for:
//! - Expenses (the canonical local records)
//! - The pending sync queue
//! - The last durable sync status
//!
//! ## Architecture
//!
//! This crate implements the `IRecordStore` and `ISyncStateRepository`
//! ports from `outlay-core`. It is a driven (secondary) adapter in the
//! hexagonal architecture; the CLI and the daemon share one database file.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteRecordStore`] - `IRecordStore` implementation
//! - [`SqliteSyncStateRepository`] - `ISyncStateRepository` implementation
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use outlay_cache::{DatabasePool, SqliteRecordStore, SqliteSyncStateRepository};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/outlay/outlay.db")).await?;
//! let records = SqliteRecordStore::new(pool.pool().clone());
//! let sync_state = SqliteSyncStateRepository::new(pool.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::{SqliteRecordStore, SqliteSyncStateRepository};

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be converted to or from a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
