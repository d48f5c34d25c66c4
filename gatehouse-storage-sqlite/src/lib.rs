//! SQLite storage backend for gatehouse.
//!
//! ```rust,no_run
//! use gatehouse_core::RepositoryProvider;
//! use gatehouse_storage_sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = SqliteStorage::connect("sqlite://gatehouse.db?mode=rwc").await?;
//! let repositories = storage.into_repository_provider();
//! repositories.migrate().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Timestamps are stored as Unix milliseconds. Session identifiers and
//! remember-me tokens are stored only as SHA-256 digests.

pub mod migrations;
pub mod repositories;

use sqlx::SqlitePool;

pub use repositories::SqliteRepositoryProvider;

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePool::connect(url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_repository_provider(self) -> SqliteRepositoryProvider {
        SqliteRepositoryProvider::new(self.pool)
    }
}
