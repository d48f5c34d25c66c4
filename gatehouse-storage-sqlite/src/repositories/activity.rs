use async_trait::async_trait;
use gatehouse_core::{
    Error,
    error::{StorageError, utilities::DatabaseResultExt},
    repositories::ActivityRepository,
    storage::{ActivityAction, ActivityLogEntry},
    user::UserId,
};
use sqlx::SqlitePool;

use super::from_millis;

pub struct SqliteActivityRepository {
    pool: SqlitePool,
}

impl SqliteActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteActivityLog {
    id: String,
    user_id: String,
    action: String,
    details: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: i64,
}

impl TryFrom<SqliteActivityLog> for ActivityLogEntry {
    type Error = Error;

    fn try_from(row: SqliteActivityLog) -> Result<Self, Self::Error> {
        let action: ActivityAction = row.action.parse().map_err(|_| {
            Error::Storage(StorageError::Database(format!(
                "Unknown activity action: {}",
                row.action
            )))
        })?;

        Ok(ActivityLogEntry {
            id: row.id,
            user_id: UserId::new(&row.user_id),
            action,
            details: row.details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: from_millis(row.created_at)?,
        })
    }
}

#[async_trait]
impl ActivityRepository for SqliteActivityRepository {
    async fn record(&self, entry: &ActivityLogEntry) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (id, user_id, action, details, ip_address, user_agent, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.user_id.as_str())
        .bind(entry.action.as_str())
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to record activity")?;

        Ok(())
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, Error> {
        let rows = sqlx::query_as::<_, SqliteActivityLog>(
            r#"
            SELECT id, user_id, action, details, ip_address, user_agent, created_at
            FROM activity_logs
            WHERE user_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_db_err_with_context("Failed to list activity")?;

        rows.into_iter().map(ActivityLogEntry::try_from).collect()
    }
}
