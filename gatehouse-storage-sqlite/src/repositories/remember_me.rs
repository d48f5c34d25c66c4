use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_core::{
    Error, error::utilities::DatabaseResultExt, repositories::RememberMeRepository,
    storage::RememberMeToken, user::UserId,
};
use sqlx::SqlitePool;

use super::from_millis;

pub struct SqliteRememberMeRepository {
    pool: SqlitePool,
}

impl SqliteRememberMeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteRememberToken {
    token_hash: String,
    user_id: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: i64,
    expires_at: i64,
}

impl TryFrom<SqliteRememberToken> for RememberMeToken {
    type Error = Error;

    fn try_from(row: SqliteRememberToken) -> Result<Self, Self::Error> {
        Ok(RememberMeToken {
            token_hash: row.token_hash,
            user_id: UserId::new(&row.user_id),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: from_millis(row.created_at)?,
            expires_at: from_millis(row.expires_at)?,
        })
    }
}

#[async_trait]
impl RememberMeRepository for SqliteRememberMeRepository {
    async fn create(&self, token: &RememberMeToken) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO remember_tokens (token_hash, user_id, ip_address, user_agent, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.user_id.as_str())
        .bind(&token.ip_address)
        .bind(&token.user_agent)
        .bind(token.created_at.timestamp_millis())
        .bind(token.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to store remember-me token")?;

        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RememberMeToken>, Error> {
        let row = sqlx::query_as::<_, SqliteRememberToken>(
            r#"
            SELECT token_hash, user_id, ip_address, user_agent, created_at, expires_at
            FROM remember_tokens
            WHERE token_hash = ?1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to find remember-me token")?;

        row.map(RememberMeToken::try_from).transpose()
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM remember_tokens WHERE token_hash = ?1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to delete remember-me token")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM remember_tokens WHERE user_id = ?1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to delete user remember-me tokens")?;

        Ok(result.rows_affected())
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM remember_tokens WHERE expires_at <= ?1")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to clean up remember-me tokens")?;

        Ok(result.rows_affected())
    }
}
