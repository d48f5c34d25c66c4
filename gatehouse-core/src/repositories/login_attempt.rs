//! Repository trait for login throttling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, storage::LoginAttemptRecord};

/// Storage for per-key failed login counters.
///
/// # Atomicity
///
/// [`record_failure`](Self::record_failure) is a single read-modify-write.
/// Two concurrent failures for the same key must both be counted.
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Count one failure for `key` at `at` and return the updated record.
    ///
    /// If the previous failure happened before `window_start` the count
    /// restarts at 1 instead of incrementing.
    async fn record_failure(
        &self,
        key: &str,
        at: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<LoginAttemptRecord, Error>;

    async fn find(&self, key: &str) -> Result<Option<LoginAttemptRecord>, Error>;

    /// Remove the record for `key`. Missing keys are ignored.
    async fn clear(&self, key: &str) -> Result<(), Error>;

    /// Delete records whose last failure is before `before`.
    async fn cleanup_stale(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
