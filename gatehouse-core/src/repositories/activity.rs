use async_trait::async_trait;

use crate::{Error, storage::ActivityLogEntry, user::UserId};

/// Append-only audit sink.
#[async_trait]
pub trait ActivityRepository: Send + Sync + 'static {
    async fn record(&self, entry: &ActivityLogEntry) -> Result<(), Error>;

    /// Most recent entries for a user, newest first.
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, Error>;
}
