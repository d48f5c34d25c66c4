use crate::{
    Error,
    config::SessionConfig,
    repositories::SessionRepository,
    session::{FlashMessage, Session, SessionId},
    user::UserId,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Flash shown after an authenticated session times out.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired";

/// Owns the session lifecycle: resume, sliding timeout, fixation-safe
/// regeneration on login, and destruction.
pub struct SessionManager<R: SessionRepository> {
    repository: Arc<R>,
    config: SessionConfig,
}

impl<R: SessionRepository> SessionManager<R> {
    pub fn new(repository: Arc<R>, config: SessionConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn resume_or_create(&self, id: Option<&SessionId>) -> Result<Session, Error> {
        self.resume_or_create_at(id, Utc::now()).await
    }

    /// Load the session named by the transport identifier, or start a new one.
    ///
    /// An idle-expired session is deleted and replaced by a fresh anonymous
    /// one; if it was authenticated the replacement carries a "Session
    /// expired" flash. An identifier that matches nothing is never adopted.
    /// A resumed session has its `last_activity` moved to `now`.
    pub async fn resume_or_create_at(
        &self,
        id: Option<&SessionId>,
        now: DateTime<Utc>,
    ) -> Result<Session, Error> {
        let existing = match id {
            Some(id) => self.repository.find(id).await?,
            None => None,
        };

        let Some(mut session) = existing else {
            return self.create_at(now, None).await;
        };

        if session.is_idle_expired_at(now, self.config.idle_timeout) {
            self.repository.delete(&session.id).await?;

            let flash = match &session.user_id {
                Some(user_id) => {
                    tracing::info!(user_id = %user_id, "Session expired after inactivity");
                    Some(FlashMessage::error(SESSION_EXPIRED_MESSAGE))
                }
                None => None,
            };
            return self.create_at(now, flash).await;
        }

        session.last_activity = now;
        self.repository.touch(&session.id, now).await?;
        Ok(session)
    }

    /// Start a new anonymous session, optionally carrying a flash message.
    pub async fn start(&self, flash: Option<FlashMessage>) -> Result<Session, Error> {
        self.create_at(Utc::now(), flash).await
    }

    async fn create_at(
        &self,
        now: DateTime<Utc>,
        flash: Option<FlashMessage>,
    ) -> Result<Session, Error> {
        let mut session = Session::new_anonymous(now);
        session.flash = flash;
        self.repository.create(&session).await?;
        Ok(session)
    }

    /// Bind `user_id` to a brand-new session and invalidate the old identifier.
    ///
    /// The CSRF secret is dropped so the next form gets a fresh one. A pending
    /// flash message carries over.
    pub async fn authenticate(&self, session: Session, user_id: &UserId) -> Result<Session, Error> {
        let now = Utc::now();
        let authenticated = Session {
            user_id: Some(user_id.clone()),
            flash: session.flash.clone(),
            ..Session::new_anonymous(now)
        };

        self.repository.create(&authenticated).await?;
        self.repository.delete(&session.id).await?;

        tracing::debug!(user_id = %user_id, "Session regenerated on authentication");
        Ok(authenticated)
    }

    /// Discard the session and everything stored on it.
    pub async fn destroy(&self, session: Session) -> Result<(), Error> {
        self.repository.delete(&session.id).await
    }

    /// Persist changes made to a session during a request.
    pub async fn save(&self, session: &Session) -> Result<(), Error> {
        self.repository.save(session).await
    }

    /// Sign a user out everywhere.
    pub async fn destroy_all_for_user(&self, user_id: &UserId) -> Result<u64, Error> {
        self.repository.delete_by_user_id(user_id).await
    }

    /// Delete sessions idle for longer than the timeout.
    pub async fn cleanup_idle(&self) -> Result<u64, Error> {
        self.repository
            .cleanup_idle(Utc::now() - self.config.idle_timeout)
            .await
    }
}
