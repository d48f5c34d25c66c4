use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_core::{
    Error,
    error::{StorageError, utilities::DatabaseResultExt},
    repositories::SessionRepository,
    session::{CsrfToken, FlashKind, FlashMessage, Session, SessionId},
    user::UserId,
};
use sqlx::SqlitePool;

use super::from_millis;

pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SqliteSession {
    user_id: Option<String>,
    created_at: i64,
    last_activity: i64,
    csrf_secret: Option<String>,
    flash_kind: Option<String>,
    flash_message: Option<String>,
    remember_digest: Option<String>,
}

impl SqliteSession {
    /// The row holds only the digest, so the caller supplies the identifier it looked up by.
    fn into_session(self, id: SessionId) -> Result<Session, Error> {
        let flash = match (self.flash_kind, self.flash_message) {
            (Some(kind), Some(message)) => {
                let kind: FlashKind = kind.parse().map_err(|_| {
                    Error::Storage(StorageError::Database(format!(
                        "Unknown flash kind: {kind}"
                    )))
                })?;
                Some(FlashMessage::new(kind, message))
            }
            _ => None,
        };

        Ok(Session {
            id,
            user_id: self.user_id.as_deref().map(UserId::new),
            created_at: from_millis(self.created_at)?,
            last_activity: from_millis(self.last_activity)?,
            csrf_secret: self.csrf_secret.as_deref().map(CsrfToken::new),
            flash,
            remember_digest: self.remember_digest,
        })
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: &Session) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id_hash, user_id, created_at, last_activity, csrf_secret, flash_kind, flash_message, remember_digest)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(session.id.digest())
        .bind(session.user_id.as_ref().map(|id| id.as_str()))
        .bind(session.created_at.timestamp_millis())
        .bind(session.last_activity.timestamp_millis())
        .bind(session.csrf_secret.as_ref().map(|t| t.as_str()))
        .bind(session.flash.as_ref().map(|f| f.kind.as_str()))
        .bind(session.flash.as_ref().map(|f| f.message.as_str()))
        .bind(&session.remember_digest)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::Storage(
                StorageError::Constraint("sessions.id_hash must be unique".to_string()),
            ),
            other => {
                tracing::error!(error = %other, "Failed to create session");
                Error::Storage(StorageError::Database(
                    "Failed to create session".to_string(),
                ))
            }
        })?;

        Ok(())
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, Error> {
        let row = sqlx::query_as::<_, SqliteSession>(
            r#"
            SELECT user_id, created_at, last_activity, csrf_secret, flash_kind, flash_message, remember_digest
            FROM sessions
            WHERE id_hash = ?1
            "#,
        )
        .bind(id.digest())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to find session")?;

        row.map(|row| row.into_session(id.clone())).transpose()
    }

    async fn save(&self, session: &Session) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE sessions SET
                user_id = ?2,
                last_activity = ?3,
                csrf_secret = ?4,
                flash_kind = ?5,
                flash_message = ?6,
                remember_digest = ?7
            WHERE id_hash = ?1
            "#,
        )
        .bind(session.id.digest())
        .bind(session.user_id.as_ref().map(|id| id.as_str()))
        .bind(session.last_activity.timestamp_millis())
        .bind(session.csrf_secret.as_ref().map(|t| t.as_str()))
        .bind(session.flash.as_ref().map(|f| f.kind.as_str()))
        .bind(session.flash.as_ref().map(|f| f.message.as_str()))
        .bind(&session.remember_digest)
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to save session")?;

        Ok(())
    }

    async fn touch(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query("UPDATE sessions SET last_activity = ?1 WHERE id_hash = ?2")
            .bind(at.timestamp_millis())
            .bind(id.digest())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to touch session")?;

        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), Error> {
        sqlx::query("DELETE FROM sessions WHERE id_hash = ?1")
            .bind(id.digest())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to delete session")?;

        Ok(())
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to delete user sessions")?;

        Ok(result.rows_affected())
    }

    async fn cleanup_idle(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_activity < ?1")
            .bind(before.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to clean up idle sessions")?;

        Ok(result.rows_affected())
    }
}
