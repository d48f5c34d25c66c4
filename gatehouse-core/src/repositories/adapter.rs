use crate::{
    Error,
    repositories::{
        ActivityRepository, CredentialRepository, LoginAttemptRepository, RememberMeRepository,
        RepositoryProvider, SessionRepository,
    },
    session::{Session, SessionId},
    storage::{ActivityLogEntry, LoginAttemptRecord, RememberMeToken},
    user::{Credential, NewCredential, UserId},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Adapter that wraps a RepositoryProvider and implements CredentialRepository
pub struct CredentialRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> CredentialRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> CredentialRepository for CredentialRepositoryAdapter<R> {
    async fn create(&self, credential: NewCredential) -> Result<Credential, Error> {
        self.provider.credential().create(credential).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, Error> {
        self.provider.credential().find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, Error> {
        self.provider.credential().find_by_email(email).await
    }

    async fn set_active(&self, id: &UserId, is_active: bool) -> Result<(), Error> {
        self.provider.credential().set_active(id, is_active).await
    }
}

pub struct SessionRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> SessionRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> SessionRepository for SessionRepositoryAdapter<R> {
    async fn create(&self, session: &Session) -> Result<(), Error> {
        self.provider.session().create(session).await
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, Error> {
        self.provider.session().find(id).await
    }

    async fn save(&self, session: &Session) -> Result<(), Error> {
        self.provider.session().save(session).await
    }

    async fn touch(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), Error> {
        self.provider.session().touch(id, at).await
    }

    async fn delete(&self, id: &SessionId) -> Result<(), Error> {
        self.provider.session().delete(id).await
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<u64, Error> {
        self.provider.session().delete_by_user_id(user_id).await
    }

    async fn cleanup_idle(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.session().cleanup_idle(before).await
    }
}

pub struct LoginAttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginAttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for LoginAttemptRepositoryAdapter<R> {
    async fn record_failure(
        &self,
        key: &str,
        at: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<LoginAttemptRecord, Error> {
        self.provider
            .login_attempt()
            .record_failure(key, at, window_start)
            .await
    }

    async fn find(&self, key: &str) -> Result<Option<LoginAttemptRecord>, Error> {
        self.provider.login_attempt().find(key).await
    }

    async fn clear(&self, key: &str) -> Result<(), Error> {
        self.provider.login_attempt().clear(key).await
    }

    async fn cleanup_stale(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.login_attempt().cleanup_stale(before).await
    }
}

pub struct RememberMeRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> RememberMeRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> RememberMeRepository for RememberMeRepositoryAdapter<R> {
    async fn create(&self, token: &RememberMeToken) -> Result<(), Error> {
        self.provider.remember_me().create(token).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RememberMeToken>, Error> {
        self.provider.remember_me().find_by_hash(token_hash).await
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<bool, Error> {
        self.provider.remember_me().delete_by_hash(token_hash).await
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<u64, Error> {
        self.provider.remember_me().delete_by_user_id(user_id).await
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.remember_me().cleanup_expired(now).await
    }
}

pub struct ActivityRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> ActivityRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> ActivityRepository for ActivityRepositoryAdapter<R> {
    async fn record(&self, entry: &ActivityLogEntry) -> Result<(), Error> {
        self.provider.activity().record(entry).await
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, Error> {
        self.provider.activity().find_by_user_id(user_id, limit).await
    }
}
