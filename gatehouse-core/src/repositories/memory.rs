//! In-memory storage backend.
//!
//! Backed by `DashMap`, so every single-key operation is atomic. Useful for
//! tests and for running the services without a database. Nothing survives a
//! restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    Error,
    error::StorageError,
    repositories::{
        ActivityRepository, ActivityRepositoryProvider, CredentialRepository,
        CredentialRepositoryProvider, LoginAttemptRepository, LoginAttemptRepositoryProvider,
        RememberMeRepository, RememberMeRepositoryProvider, RepositoryProvider,
        SessionRepository, SessionRepositoryProvider,
    },
    session::{CsrfToken, FlashMessage, Session, SessionId},
    storage::{ActivityLogEntry, LoginAttemptRecord, RememberMeToken},
    user::{Credential, NewCredential, UserId},
};

#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    credentials: InMemoryCredentialRepository,
    sessions: InMemorySessionRepository,
    login_attempts: InMemoryLoginAttemptRepository,
    remember_me: InMemoryRememberMeRepository,
    activity: InMemoryActivityRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialRepositoryProvider for InMemoryRepositoryProvider {
    type CredentialRepo = InMemoryCredentialRepository;

    fn credential(&self) -> &Self::CredentialRepo {
        &self.credentials
    }
}

impl SessionRepositoryProvider for InMemoryRepositoryProvider {
    type SessionRepo = InMemorySessionRepository;

    fn session(&self) -> &Self::SessionRepo {
        &self.sessions
    }
}

impl LoginAttemptRepositoryProvider for InMemoryRepositoryProvider {
    type LoginAttemptRepo = InMemoryLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempts
    }
}

impl RememberMeRepositoryProvider for InMemoryRepositoryProvider {
    type RememberMeRepo = InMemoryRememberMeRepository;

    fn remember_me(&self) -> &Self::RememberMeRepo {
        &self.remember_me
    }
}

impl ActivityRepositoryProvider for InMemoryRepositoryProvider {
    type ActivityRepo = InMemoryActivityRepository;

    fn activity(&self) -> &Self::ActivityRepo {
        &self.activity
    }
}

#[async_trait]
impl RepositoryProvider for InMemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}

// ============================================================================
// Credentials
// ============================================================================

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    by_id: DashMap<UserId, Credential>,
    id_by_email: DashMap<String, UserId>,
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn create(&self, credential: NewCredential) -> Result<Credential, Error> {
        // The email index entry is the uniqueness lock.
        match self.id_by_email.entry(credential.email.clone()) {
            Entry::Occupied(_) => Err(Error::Storage(StorageError::Constraint(
                "credentials.email must be unique".to_string(),
            ))),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let stored = Credential {
                    id: credential.id,
                    full_name: credential.full_name,
                    email: credential.email,
                    phone: credential.phone,
                    account_type: credential.account_type,
                    password_hash: credential.password_hash,
                    is_active: credential.is_active,
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(stored.id.clone());
                self.by_id.insert(stored.id.clone(), stored.clone());
                Ok(stored)
            }
        }
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, Error> {
        Ok(self.by_id.get(id).map(|c| c.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, Error> {
        let Some(id) = self.id_by_email.get(email).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.find_by_id(&id).await
    }

    async fn set_active(&self, id: &UserId, is_active: bool) -> Result<(), Error> {
        let mut credential = self
            .by_id
            .get_mut(id)
            .ok_or(Error::Storage(StorageError::NotFound))?;
        credential.is_active = is_active;
        credential.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Session attributes without the raw identifier.
#[derive(Clone)]
struct StoredSession {
    user_id: Option<UserId>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    csrf_secret: Option<CsrfToken>,
    flash: Option<FlashMessage>,
    remember_digest: Option<String>,
}

impl StoredSession {
    fn from_session(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            created_at: session.created_at,
            last_activity: session.last_activity,
            csrf_secret: session.csrf_secret.clone(),
            flash: session.flash.clone(),
            remember_digest: session.remember_digest.clone(),
        }
    }

    fn into_session(self, id: SessionId) -> Session {
        Session {
            id,
            user_id: self.user_id,
            created_at: self.created_at,
            last_activity: self.last_activity,
            csrf_secret: self.csrf_secret,
            flash: self.flash,
            remember_digest: self.remember_digest,
        }
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: DashMap<String, StoredSession>,
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: &Session) -> Result<(), Error> {
        match self.sessions.entry(session.id.digest()) {
            Entry::Occupied(_) => Err(Error::Storage(StorageError::Constraint(
                "sessions.id_hash must be unique".to_string(),
            ))),
            Entry::Vacant(slot) => {
                slot.insert(StoredSession::from_session(session));
                Ok(())
            }
        }
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, Error> {
        Ok(self
            .sessions
            .get(&id.digest())
            .map(|stored| stored.clone().into_session(id.clone())))
    }

    async fn save(&self, session: &Session) -> Result<(), Error> {
        if let Some(mut stored) = self.sessions.get_mut(&session.id.digest()) {
            *stored = StoredSession::from_session(session);
        }
        Ok(())
    }

    async fn touch(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), Error> {
        if let Some(mut stored) = self.sessions.get_mut(&id.digest()) {
            stored.last_activity = at;
        }
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), Error> {
        self.sessions.remove(&id.digest());
        Ok(())
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<u64, Error> {
        let before_len = self.sessions.len();
        self.sessions
            .retain(|_, stored| stored.user_id.as_ref() != Some(user_id));
        Ok(before_len.saturating_sub(self.sessions.len()) as u64)
    }

    async fn cleanup_idle(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let before_len = self.sessions.len();
        self.sessions
            .retain(|_, stored| stored.last_activity >= before);
        Ok(before_len.saturating_sub(self.sessions.len()) as u64)
    }
}

// ============================================================================
// Login attempts
// ============================================================================

#[derive(Default)]
pub struct InMemoryLoginAttemptRepository {
    records: DashMap<String, LoginAttemptRecord>,
}

#[async_trait]
impl LoginAttemptRepository for InMemoryLoginAttemptRepository {
    async fn record_failure(
        &self,
        key: &str,
        at: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<LoginAttemptRecord, Error> {
        // The entry guard holds the shard lock for the whole update.
        let mut record = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| LoginAttemptRecord {
                key: key.to_string(),
                attempts: 0,
                last_failure_at: at,
            });

        if record.last_failure_at <= window_start {
            record.attempts = 0;
        }
        record.attempts += 1;
        record.last_failure_at = at;

        Ok(record.value().clone())
    }

    async fn find(&self, key: &str) -> Result<Option<LoginAttemptRecord>, Error> {
        Ok(self.records.get(key).map(|r| r.clone()))
    }

    async fn clear(&self, key: &str) -> Result<(), Error> {
        self.records.remove(key);
        Ok(())
    }

    async fn cleanup_stale(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let before_len = self.records.len();
        self.records
            .retain(|_, record| record.last_failure_at > before);
        Ok(before_len.saturating_sub(self.records.len()) as u64)
    }
}

// ============================================================================
// Remember-me tokens
// ============================================================================

#[derive(Default)]
pub struct InMemoryRememberMeRepository {
    tokens: DashMap<String, RememberMeToken>,
}

#[async_trait]
impl RememberMeRepository for InMemoryRememberMeRepository {
    async fn create(&self, token: &RememberMeToken) -> Result<(), Error> {
        match self.tokens.entry(token.token_hash.clone()) {
            Entry::Occupied(_) => Err(Error::Storage(StorageError::Constraint(
                "remember_tokens.token_hash must be unique".to_string(),
            ))),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RememberMeToken>, Error> {
        Ok(self.tokens.get(token_hash).map(|t| t.clone()))
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<bool, Error> {
        Ok(self.tokens.remove(token_hash).is_some())
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<u64, Error> {
        let before_len = self.tokens.len();
        self.tokens.retain(|_, token| &token.user_id != user_id);
        Ok(before_len.saturating_sub(self.tokens.len()) as u64)
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let before_len = self.tokens.len();
        self.tokens.retain(|_, token| !token.is_expired_at(now));
        Ok(before_len.saturating_sub(self.tokens.len()) as u64)
    }
}

// ============================================================================
// Activity log
// ============================================================================

#[derive(Default)]
pub struct InMemoryActivityRepository {
    entries: DashMap<String, ActivityLogEntry>,
}

#[async_trait]
impl ActivityRepository for InMemoryActivityRepository {
    async fn record(&self, entry: &ActivityLogEntry) -> Result<(), Error> {
        self.entries.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, Error> {
        let mut entries: Vec<ActivityLogEntry> = self
            .entries
            .iter()
            .filter(|e| &e.user_id == user_id)
            .map(|e| e.clone())
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit as usize);
        Ok(entries)
    }
}
