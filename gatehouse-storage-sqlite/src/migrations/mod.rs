//! Schema for the SQLite backend.
//!
//! Every migration is a list of SQL statements run inside one transaction
//! together with its bookkeeping row.

use async_trait::async_trait;
use chrono::Utc;
use gatehouse_migration::{
    Migration, MigrationError, MigrationManager, MigrationRecord, pending, rollback_order,
};
use sqlx::{Database, Sqlite, SqlitePool};

pub struct SqliteMigrationManager {
    pool: SqlitePool,
}

impl SqliteMigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MigrationManager<Sqlite> for SqliteMigrationManager {
    async fn initialize(&self) -> Result<(), MigrationError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            )",
            self.table_name()
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn up(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<(), MigrationError> {
        let applied = self.applied().await?;
        let record = format!(
            "INSERT INTO {} (version, name, applied_at) VALUES (?1, ?2, ?3)",
            self.table_name()
        );

        for migration in pending(migrations, &applied)? {
            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Applying migration"
            );

            let mut tx = self.pool.begin().await?;
            migration.up(&mut *tx).await?;
            sqlx::query(&record)
                .bind(migration.version())
                .bind(migration.name())
                .bind(Utc::now().timestamp_millis())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        Ok(())
    }

    async fn down(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<(), MigrationError> {
        let applied = self.applied().await?;
        let forget = format!("DELETE FROM {} WHERE version = ?1", self.table_name());

        for migration in rollback_order(migrations, &applied)? {
            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Rolling back migration"
            );

            let mut tx = self.pool.begin().await?;
            migration.down(&mut *tx).await?;
            sqlx::query(&forget)
                .bind(migration.version())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        Ok(())
    }

    async fn applied(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let query = format!(
            "SELECT version, name, applied_at FROM {} ORDER BY version",
            self.table_name()
        );
        Ok(sqlx::query_as::<_, MigrationRecord>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn is_applied(&self, version: i64) -> Result<bool, MigrationError> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE version = ?1)",
            self.table_name()
        );
        Ok(sqlx::query_scalar(&query)
            .bind(version)
            .fetch_one(&self.pool)
            .await?)
    }
}

/// A migration made of plain SQL statements.
pub struct SqlMigration {
    version: i64,
    name: &'static str,
    up: &'static [&'static str],
    down: &'static [&'static str],
}

async fn run_all(
    conn: &mut <Sqlite as Database>::Connection,
    statements: &[&str],
) -> Result<(), MigrationError> {
    for statement in statements {
        sqlx::query(statement).execute(&mut *conn).await?;
    }
    Ok(())
}

#[async_trait]
impl Migration<Sqlite> for SqlMigration {
    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        run_all(conn, self.up).await
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        run_all(conn, self.down).await
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn name(&self) -> &str {
        self.name
    }
}

const CREATE_USERS: SqlMigration = SqlMigration {
    version: 1,
    name: "CreateUsersTable",
    up: &[r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            account_type TEXT NOT NULL DEFAULT 'both',
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )"#],
    down: &["DROP TABLE IF EXISTS users"],
};

// Sessions are keyed by the SHA-256 digest of the identifier, never the identifier.
const CREATE_SESSIONS: SqlMigration = SqlMigration {
    version: 2,
    name: "CreateSessionsTable",
    up: &[r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id_hash TEXT PRIMARY KEY,
            user_id TEXT REFERENCES users(id) ON DELETE CASCADE,
            created_at INTEGER NOT NULL,
            last_activity INTEGER NOT NULL,
            csrf_secret TEXT,
            flash_kind TEXT,
            flash_message TEXT,
            remember_digest TEXT
        )"#],
    down: &["DROP TABLE IF EXISTS sessions"],
};

const CREATE_LOGIN_ATTEMPTS: SqlMigration = SqlMigration {
    version: 3,
    name: "CreateLoginAttemptsTable",
    up: &[r#"
        CREATE TABLE IF NOT EXISTS login_attempts (
            throttle_key TEXT PRIMARY KEY,
            attempts INTEGER NOT NULL,
            last_failure_at INTEGER NOT NULL
        )"#],
    down: &["DROP TABLE IF EXISTS login_attempts"],
};

const CREATE_REMEMBER_TOKENS: SqlMigration = SqlMigration {
    version: 4,
    name: "CreateRememberTokensTable",
    up: &[r#"
        CREATE TABLE IF NOT EXISTS remember_tokens (
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            ip_address TEXT,
            user_agent TEXT,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        )"#],
    down: &["DROP TABLE IF EXISTS remember_tokens"],
};

const CREATE_ACTIVITY_LOGS: SqlMigration = SqlMigration {
    version: 5,
    name: "CreateActivityLogsTable",
    up: &[r#"
        CREATE TABLE IF NOT EXISTS activity_logs (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            action TEXT NOT NULL,
            details TEXT NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            created_at INTEGER NOT NULL
        )"#],
    down: &["DROP TABLE IF EXISTS activity_logs"],
};

const CREATE_INDEXES: SqlMigration = SqlMigration {
    version: 6,
    name: "CreateIndexes",
    up: &[
        "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_last_activity ON sessions(last_activity)",
        "CREATE INDEX IF NOT EXISTS idx_login_attempts_last_failure_at ON login_attempts(last_failure_at)",
        "CREATE INDEX IF NOT EXISTS idx_remember_tokens_user_id ON remember_tokens(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_remember_tokens_expires_at ON remember_tokens(expires_at)",
        "CREATE INDEX IF NOT EXISTS idx_activity_logs_user_created ON activity_logs(user_id, created_at)",
    ],
    down: &[
        "DROP INDEX IF EXISTS idx_sessions_user_id",
        "DROP INDEX IF EXISTS idx_sessions_last_activity",
        "DROP INDEX IF EXISTS idx_login_attempts_last_failure_at",
        "DROP INDEX IF EXISTS idx_remember_tokens_user_id",
        "DROP INDEX IF EXISTS idx_remember_tokens_expires_at",
        "DROP INDEX IF EXISTS idx_activity_logs_user_created",
    ],
};

/// Every schema migration for this backend.
pub fn all_migrations() -> Vec<Box<dyn Migration<Sqlite>>> {
    vec![
        Box::new(CREATE_USERS),
        Box::new(CREATE_SESSIONS),
        Box::new(CREATE_LOGIN_ATTEMPTS),
        Box::new(CREATE_REMEMBER_TOKENS),
        Box::new(CREATE_ACTIVITY_LOGS),
        Box::new(CREATE_INDEXES),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager() -> SqliteMigrationManager {
        let _ = tracing_subscriber::fmt().try_init();
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        let manager = SqliteMigrationManager::new(pool);
        manager.initialize().await.expect("Failed to initialize");
        manager
    }

    async fn table_count(manager: &SqliteMigrationManager) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
             ('users', 'sessions', 'login_attempts', 'remember_tokens', 'activity_logs')",
        )
        .fetch_one(&manager.pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_up_then_down() -> Result<(), MigrationError> {
        let manager = manager().await;

        manager.up(&all_migrations()).await?;
        assert!(manager.is_applied(6).await?);
        assert_eq!(table_count(&manager).await, 5);

        // Listed oldest first; rollback still drops dependants first.
        manager.down(&all_migrations()).await?;
        assert!(!manager.is_applied(1).await?);
        assert!(manager.applied().await?.is_empty());
        assert_eq!(table_count(&manager).await, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_up_is_idempotent() -> Result<(), MigrationError> {
        let manager = manager().await;
        manager.initialize().await?;

        let migrations = all_migrations();
        manager.up(&migrations).await?;
        manager.up(&migrations).await?;

        let versions: Vec<i64> = manager.applied().await?.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5, 6]);

        Ok(())
    }

    #[tokio::test]
    async fn test_up_applies_only_missing_versions() -> Result<(), MigrationError> {
        let manager = manager().await;

        let mut migrations = all_migrations();
        let later = migrations.split_off(3);
        manager.up(&migrations).await?;
        assert!(!manager.is_applied(4).await?);

        migrations.extend(later);
        manager.up(&migrations).await?;
        assert_eq!(manager.applied().await?.len(), 6);

        Ok(())
    }
}
