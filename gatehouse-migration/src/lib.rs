//! Versioned schema migrations shared by the gatehouse storage backends.
//!
//! A backend implements [`MigrationManager`] once and defines one
//! [`Migration`] per schema change. Applied versions are recorded in a
//! bookkeeping table, so `up` can run on every start. Migrations are always
//! applied in ascending and rolled back in descending version order,
//! whatever order the caller lists them in.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::Database;
use thiserror::Error;

pub const MIGRATION_TABLE: &str = "_gatehouse_migrations";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Duplicate migration version {0}")]
    DuplicateVersion(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Orders migrations; must be unique within a backend.
    fn version(&self) -> i64;

    fn name(&self) -> &str;
}

/// A row of the bookkeeping table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// Unix milliseconds.
    pub applied_at: i64,
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn table_name(&self) -> &str {
        MIGRATION_TABLE
    }

    /// Create the bookkeeping table if it does not exist.
    async fn initialize(&self) -> Result<()>;

    /// Apply every migration that is not recorded yet.
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Roll back every recorded migration.
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Recorded migrations, lowest version first.
    async fn applied(&self) -> Result<Vec<MigrationRecord>>;

    async fn is_applied(&self, version: i64) -> Result<bool>;
}

/// Migrations not in `applied`, lowest version first.
pub fn pending<'m, DB: Database>(
    migrations: &'m [Box<dyn Migration<DB>>],
    applied: &[MigrationRecord],
) -> Result<Vec<&'m dyn Migration<DB>>> {
    check_unique_versions(migrations)?;
    let done: HashSet<i64> = applied.iter().map(|record| record.version).collect();

    let mut pending: Vec<&dyn Migration<DB>> = migrations
        .iter()
        .map(|migration| migration.as_ref())
        .filter(|migration| !done.contains(&migration.version()))
        .collect();
    pending.sort_by_key(|migration| migration.version());
    Ok(pending)
}

/// Migrations in `applied`, highest version first.
pub fn rollback_order<'m, DB: Database>(
    migrations: &'m [Box<dyn Migration<DB>>],
    applied: &[MigrationRecord],
) -> Result<Vec<&'m dyn Migration<DB>>> {
    check_unique_versions(migrations)?;
    let done: HashSet<i64> = applied.iter().map(|record| record.version).collect();

    let mut recorded: Vec<&dyn Migration<DB>> = migrations
        .iter()
        .map(|migration| migration.as_ref())
        .filter(|migration| done.contains(&migration.version()))
        .collect();
    recorded.sort_by_key(|migration| std::cmp::Reverse(migration.version()));
    Ok(recorded)
}

fn check_unique_versions<DB: Database>(migrations: &[Box<dyn Migration<DB>>]) -> Result<()> {
    let mut seen = HashSet::new();
    for migration in migrations {
        if !seen.insert(migration.version()) {
            return Err(MigrationError::DuplicateVersion(migration.version()));
        }
    }
    Ok(())
}
