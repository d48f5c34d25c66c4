//! Remember-me tokens.
//!
//! A token is 256 random bits handed to the browser once. Only its SHA-256
//! digest is stored, together with the owning user, the issuing client and a
//! fixed expiry. Resolving a token never extends that expiry.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Error,
    config::RememberMeConfig,
    crypto::{generate_secure_token, hash_token},
    repositories::RememberMeRepository,
    storage::{ClientFingerprint, RememberMeToken},
    user::UserId,
};

/// A freshly issued token. `value` goes into the cookie and cannot be
/// recovered later.
#[derive(Clone)]
pub struct RememberMeHandle {
    pub value: String,
    pub record: RememberMeToken,
}

impl std::fmt::Debug for RememberMeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RememberMeHandle")
            .field("value", &"..")
            .field("record", &self.record)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RememberMeResolution {
    Valid(UserId),
    NotFound,
    Expired,
}

pub struct RememberMeService<R: RememberMeRepository> {
    repository: Arc<R>,
    config: RememberMeConfig,
}

impl<R: RememberMeRepository> RememberMeService<R> {
    pub fn new(repository: Arc<R>, config: RememberMeConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &RememberMeConfig {
        &self.config
    }

    /// Create and store a new token for `user_id`.
    pub async fn issue(
        &self,
        user_id: &UserId,
        client: &ClientFingerprint,
    ) -> Result<RememberMeHandle, Error> {
        let value = generate_secure_token();
        let now = Utc::now();
        let record = RememberMeToken {
            token_hash: hash_token(&value),
            user_id: user_id.clone(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            created_at: now,
            expires_at: now + self.config.lifetime,
        };

        self.repository.create(&record).await?;
        tracing::debug!(user_id = %user_id, expires_at = %record.expires_at, "Issued remember-me token");

        Ok(RememberMeHandle { value, record })
    }

    pub async fn resolve(&self, value: &str) -> Result<RememberMeResolution, Error> {
        self.resolve_at(value, Utc::now()).await
    }

    /// Look up a presented token. An expired record is deleted.
    pub async fn resolve_at(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<RememberMeResolution, Error> {
        let token_hash = hash_token(value);
        let Some(record) = self.repository.find_by_hash(&token_hash).await? else {
            tracing::debug!("Remember-me token not recognised");
            return Ok(RememberMeResolution::NotFound);
        };

        if record.is_expired_at(now) {
            self.repository.delete_by_hash(&token_hash).await?;
            tracing::info!(user_id = %record.user_id, "Remember-me token expired and was deleted");
            return Ok(RememberMeResolution::Expired);
        }

        Ok(RememberMeResolution::Valid(record.user_id))
    }

    /// Delete the record for a raw token value. Absent tokens are ignored.
    pub async fn revoke(&self, value: &str) -> Result<(), Error> {
        self.revoke_digest(&hash_token(value)).await
    }

    /// Delete the record for a stored digest. Absent tokens are ignored.
    pub async fn revoke_digest(&self, token_hash: &str) -> Result<(), Error> {
        if self.repository.delete_by_hash(token_hash).await? {
            tracing::debug!("Revoked remember-me token");
        }
        Ok(())
    }

    /// Revoke every device's token for a user.
    pub async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<u64, Error> {
        let count = self.repository.delete_by_user_id(user_id).await?;
        tracing::info!(user_id = %user_id, count, "Revoked all remember-me tokens");
        Ok(count)
    }

    pub async fn cleanup_expired(&self) -> Result<u64, Error> {
        self.repository.cleanup_expired(Utc::now()).await
    }
}
