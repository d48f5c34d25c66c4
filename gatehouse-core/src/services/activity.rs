use crate::{
    Error,
    repositories::ActivityRepository,
    storage::{ActivityAction, ActivityLogEntry, ClientFingerprint},
    user::UserId,
};
use std::sync::Arc;

/// Writes the audit trail. Failures are logged and never reach the caller,
/// so a broken audit sink cannot fail a login.
pub struct ActivityLogService<R: ActivityRepository> {
    repository: Arc<R>,
}

impl<R: ActivityRepository> ActivityLogService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub async fn log(
        &self,
        user_id: &UserId,
        action: ActivityAction,
        details: &str,
        client: &ClientFingerprint,
    ) {
        let entry = ActivityLogEntry::new(user_id.clone(), action, details, client);
        if let Err(e) = self.repository.record(&entry).await {
            tracing::warn!(
                error = %e,
                user_id = %user_id,
                action = action.as_str(),
                "Failed to write activity log entry"
            );
        }
    }

    pub async fn recent_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, Error> {
        self.repository.find_by_user_id(user_id, limit).await
    }
}
