use async_trait::async_trait;
use chrono::Utc;
use gatehouse_core::{
    Error,
    error::{StorageError, utilities::DatabaseResultExt},
    repositories::CredentialRepository,
    services::HashedCredential,
    user::{AccountType, Credential, NewCredential, UserId},
};
use sqlx::SqlitePool;

use super::from_millis;

pub struct SqliteCredentialRepository {
    pool: SqlitePool,
}

impl SqliteCredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SqliteCredential {
    id: String,
    full_name: String,
    email: String,
    phone: Option<String>,
    account_type: String,
    password_hash: String,
    is_active: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SqliteCredential> for Credential {
    type Error = Error;

    fn try_from(row: SqliteCredential) -> Result<Self, Self::Error> {
        let account_type: AccountType = row.account_type.parse().map_err(|_| {
            Error::Storage(StorageError::Database(format!(
                "Unknown account type for user {}",
                row.id
            )))
        })?;

        Ok(Credential {
            id: UserId::new(&row.id),
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            account_type,
            password_hash: HashedCredential::from(row.password_hash),
            is_active: row.is_active,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

const SELECT_COLUMNS: &str = "id, full_name, email, phone, account_type, password_hash, is_active, created_at, updated_at";

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn create(&self, credential: NewCredential) -> Result<Credential, Error> {
        let now = Utc::now().timestamp_millis();

        let row = sqlx::query_as::<_, SqliteCredential>(&format!(
            r#"
            INSERT INTO users (id, full_name, email, phone, account_type, password_hash, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(credential.id.as_str())
        .bind(&credential.full_name)
        .bind(&credential.email)
        .bind(&credential.phone)
        .bind(credential.account_type.as_str())
        .bind(credential.password_hash.as_str())
        .bind(credential.is_active)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::Storage(
                StorageError::Constraint("users.email must be unique".to_string()),
            ),
            other => {
                tracing::error!(error = %other, "Failed to create user");
                Error::Storage(StorageError::Database("Failed to create user".to_string()))
            }
        })?;

        row.try_into()
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, Error> {
        let row = sqlx::query_as::<_, SqliteCredential>(&format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to find user by id")?;

        row.map(Credential::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, Error> {
        let row = sqlx::query_as::<_, SqliteCredential>(&format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE email = ?1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to find user by email")?;

        row.map(Credential::try_from).transpose()
    }

    async fn set_active(&self, id: &UserId, is_active: bool) -> Result<(), Error> {
        let result = sqlx::query("UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(is_active)
            .bind(Utc::now().timestamp_millis())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to update user status")?;

        if result.rows_affected() == 0 {
            return Err(Error::Storage(StorageError::NotFound));
        }
        Ok(())
    }
}
