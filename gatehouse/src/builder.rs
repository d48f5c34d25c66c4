//! Builder for [`Gatehouse`] instances.
//!
//! The builder is type-stated: storage must be chosen before `build` exists.
//!
//! ```rust,no_run
//! use gatehouse::GatehouseBuilder;
//! use chrono::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gatehouse = GatehouseBuilder::new()
//!     .with_sqlite("sqlite::memory:")
//!     .await?
//!     .with_session_timeout(Duration::minutes(30))
//!     .apply_migrations(true)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::Duration;
use gatehouse_core::{LoginThrottleConfig, PasswordConfig, RepositoryProvider};

use crate::{Gatehouse, GatehouseConfig};

#[derive(Debug, thiserror::Error)]
pub enum GatehouseBuilderError {
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// No storage chosen yet.
pub struct NoStorage;

/// Storage chosen; the builder can now `build`.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

pub struct GatehouseBuilder<Storage> {
    storage: Storage,
    config: GatehouseConfig,
    apply_migrations: bool,
}

impl Default for GatehouseBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl GatehouseBuilder<NoStorage> {
    /// Default configuration, no automatic migrations.
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: GatehouseConfig::default(),
            apply_migrations: false,
        }
    }

    /// Use any repository provider, e.g. the in-memory one in tests.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> GatehouseBuilder<WithStorage<R>> {
        GatehouseBuilder {
            storage: WithStorage { repositories },
            config: self.config,
            apply_migrations: self.apply_migrations,
        }
    }
}

#[cfg(feature = "sqlite")]
impl GatehouseBuilder<NoStorage> {
    /// Connect to SQLite at `url`, e.g. `sqlite::memory:` or `sqlite://app.db?mode=rwc`.
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<GatehouseBuilder<WithStorage<crate::SqliteRepositoryProvider>>, GatehouseBuilderError>
    {
        let storage = crate::SqliteStorage::connect(url)
            .await
            .map_err(|e| GatehouseBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(storage.into_repository_provider())))
    }

    /// Share an existing SQLite pool.
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> GatehouseBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_repositories(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

impl<Storage> GatehouseBuilder<Storage> {
    /// Replace the whole configuration, e.g. with [`GatehouseConfig::from_env`].
    pub fn with_config(mut self, config: GatehouseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_login_throttle(mut self, config: LoginThrottleConfig) -> Self {
        self.config = self.config.with_login_throttle(config);
        self
    }

    pub fn with_session_timeout(mut self, idle_timeout: Duration) -> Self {
        self.config = self.config.with_session_timeout(idle_timeout);
        self
    }

    pub fn with_remember_me_lifetime(mut self, lifetime: Duration) -> Self {
        self.config = self.config.with_remember_me_lifetime(lifetime);
        self
    }

    pub fn with_password(mut self, config: PasswordConfig) -> Self {
        self.config = self.config.with_password(config);
        self
    }

    pub fn with_cleanup_interval(mut self, interval: std::time::Duration) -> Self {
        self.config = self.config.with_cleanup_interval(interval);
        self
    }

    /// Run schema migrations during `build`.
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

impl<R: RepositoryProvider> GatehouseBuilder<WithStorage<R>> {
    pub async fn build(self) -> Result<Gatehouse<R>, GatehouseBuilderError> {
        let gatehouse = Gatehouse::new(self.storage.repositories, self.config)
            .map_err(|e| GatehouseBuilderError::InvalidConfiguration(e.to_string()))?;

        if self.apply_migrations {
            gatehouse
                .migrate()
                .await
                .map_err(|e| GatehouseBuilderError::Migration(e.to_string()))?;
        }

        Ok(gatehouse)
    }
}
