use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, storage::RememberMeToken, user::UserId};

/// Storage for remember-me token records, looked up by token digest.
#[async_trait]
pub trait RememberMeRepository: Send + Sync + 'static {
    async fn create(&self, token: &RememberMeToken) -> Result<(), Error>;

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RememberMeToken>, Error>;

    /// Returns whether a record was deleted.
    async fn delete_by_hash(&self, token_hash: &str) -> Result<bool, Error>;

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<u64, Error>;

    /// Delete records with `expires_at <= now`.
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}
