//! SQLite implementation of the login throttle repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_core::{
    Error, error::utilities::DatabaseResultExt, repositories::LoginAttemptRepository,
    storage::LoginAttemptRecord,
};
use sqlx::SqlitePool;

use super::from_millis;

pub struct SqliteLoginAttemptRepository {
    pool: SqlitePool,
}

impl SqliteLoginAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteLoginAttempt {
    throttle_key: String,
    attempts: i64,
    last_failure_at: i64,
}

impl TryFrom<SqliteLoginAttempt> for LoginAttemptRecord {
    type Error = Error;

    fn try_from(row: SqliteLoginAttempt) -> Result<Self, Self::Error> {
        Ok(LoginAttemptRecord {
            key: row.throttle_key,
            attempts: u32::try_from(row.attempts).unwrap_or(u32::MAX),
            last_failure_at: from_millis(row.last_failure_at)?,
        })
    }
}

#[async_trait]
impl LoginAttemptRepository for SqliteLoginAttemptRepository {
    async fn record_failure(
        &self,
        key: &str,
        at: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<LoginAttemptRecord, Error> {
        // One statement, so concurrent failures serialise on the row.
        let row = sqlx::query_as::<_, SqliteLoginAttempt>(
            r#"
            INSERT INTO login_attempts (throttle_key, attempts, last_failure_at)
            VALUES (?1, 1, ?2)
            ON CONFLICT(throttle_key) DO UPDATE SET
                attempts = CASE
                    WHEN login_attempts.last_failure_at <= ?3 THEN 1
                    ELSE login_attempts.attempts + 1
                END,
                last_failure_at = ?2
            RETURNING throttle_key, attempts, last_failure_at
            "#,
        )
        .bind(key)
        .bind(at.timestamp_millis())
        .bind(window_start.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_db_err_with_context("Failed to record failed login attempt")?;

        row.try_into()
    }

    async fn find(&self, key: &str) -> Result<Option<LoginAttemptRecord>, Error> {
        let row = sqlx::query_as::<_, SqliteLoginAttempt>(
            "SELECT throttle_key, attempts, last_failure_at FROM login_attempts WHERE throttle_key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to get login attempts")?;

        row.map(LoginAttemptRecord::try_from).transpose()
    }

    async fn clear(&self, key: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM login_attempts WHERE throttle_key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to clear login attempts")?;

        Ok(())
    }

    async fn cleanup_stale(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE last_failure_at <= ?1")
            .bind(before.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to clean up login attempts")?;

        Ok(result.rows_affected())
    }
}
