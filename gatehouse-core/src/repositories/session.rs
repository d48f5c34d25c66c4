use crate::{
    Error,
    session::{Session, SessionId},
    user::UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository for server-side session state.
///
/// Implementations key rows by [`SessionId::digest`]; the raw identifier is
/// never written to storage.
#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    /// Insert a new session.
    async fn create(&self, session: &Session) -> Result<(), Error>;

    /// Load a session by its identifier.
    async fn find(&self, id: &SessionId) -> Result<Option<Session>, Error>;

    /// Write every mutable attribute of an existing session. A session that
    /// has been deleted stays deleted.
    async fn save(&self, session: &Session) -> Result<(), Error>;

    /// Update `last_activity` only. Concurrent touches are last-writer-wins.
    async fn touch(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), Error>;

    /// Delete a session. Deleting a missing session is not an error.
    async fn delete(&self, id: &SessionId) -> Result<(), Error>;

    /// Delete every session bound to a user, returning how many were removed.
    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<u64, Error>;

    /// Delete sessions whose last activity is before `before`.
    async fn cleanup_idle(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
