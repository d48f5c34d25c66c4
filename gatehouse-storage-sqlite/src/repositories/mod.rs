//! Repository implementations for SQLite storage

pub mod activity;
pub mod credential;
pub mod login_attempt;
pub mod remember_me;
pub mod session;

pub use activity::SqliteActivityRepository;
pub use credential::SqliteCredentialRepository;
pub use login_attempt::SqliteLoginAttemptRepository;
pub use remember_me::SqliteRememberMeRepository;
pub use session::SqliteSessionRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_core::{
    Error,
    error::StorageError,
    repositories::{
        ActivityRepositoryProvider, CredentialRepositoryProvider, LoginAttemptRepositoryProvider,
        RememberMeRepositoryProvider, RepositoryProvider, SessionRepositoryProvider,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Repository provider implementation for SQLite
///
/// Implements every individual provider trait as well as the unified
/// [`RepositoryProvider`] trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    credential: Arc<SqliteCredentialRepository>,
    session: Arc<SqliteSessionRepository>,
    login_attempt: Arc<SqliteLoginAttemptRepository>,
    remember_me: Arc<SqliteRememberMeRepository>,
    activity: Arc<SqliteActivityRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let credential = Arc::new(SqliteCredentialRepository::new(pool.clone()));
        let session = Arc::new(SqliteSessionRepository::new(pool.clone()));
        let login_attempt = Arc::new(SqliteLoginAttemptRepository::new(pool.clone()));
        let remember_me = Arc::new(SqliteRememberMeRepository::new(pool.clone()));
        let activity = Arc::new(SqliteActivityRepository::new(pool.clone()));

        Self {
            pool,
            credential,
            session,
            login_attempt,
            remember_me,
            activity,
        }
    }
}

impl CredentialRepositoryProvider for SqliteRepositoryProvider {
    type CredentialRepo = SqliteCredentialRepository;

    fn credential(&self) -> &Self::CredentialRepo {
        &self.credential
    }
}

impl SessionRepositoryProvider for SqliteRepositoryProvider {
    type SessionRepo = SqliteSessionRepository;

    fn session(&self) -> &Self::SessionRepo {
        &self.session
    }
}

impl LoginAttemptRepositoryProvider for SqliteRepositoryProvider {
    type LoginAttemptRepo = SqliteLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

impl RememberMeRepositoryProvider for SqliteRepositoryProvider {
    type RememberMeRepo = SqliteRememberMeRepository;

    fn remember_me(&self) -> &Self::RememberMeRepo {
        &self.remember_me
    }
}

impl ActivityRepositoryProvider for SqliteRepositoryProvider {
    type ActivityRepo = SqliteActivityRepository;

    fn activity(&self) -> &Self::ActivityRepo {
        &self.activity
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        use crate::migrations::{SqliteMigrationManager, all_migrations};
        use gatehouse_migration::MigrationManager;

        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&all_migrations()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))?;
        Ok(())
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        Error::Storage(StorageError::Database(format!(
            "Invalid timestamp: {millis}"
        )))
    })
}
