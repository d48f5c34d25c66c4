//! Fixed-window login throttling.
//!
//! Failed logins are counted per throttle key. The `gatehouse` services use
//! the digest of the pre-authentication session identifier as the key, so a
//! client that discards its session cookie starts from zero. Account- or
//! address-keyed throttling would close that gap; this service only counts
//! what it is given.
//!
//! After `max_failed_attempts` consecutive failures the key is locked until
//! `lockout_window` has passed since the *last* failure. A success clears
//! the count.
//!
//! # Example
//!
//! ```rust,ignore
//! let admission = throttle.check_admission(&key).await?;
//! if let Admission::Denied { .. } = admission {
//!     return Err(AuthError::TooManyAttempts { retry_after_secs: admission.retry_after_secs() }.into());
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Error,
    config::LoginThrottleConfig,
    repositories::LoginAttemptRepository,
    storage::{Admission, LoginAttemptRecord, ThrottleState},
};

pub struct LoginThrottleService<R: LoginAttemptRepository> {
    repository: Arc<R>,
    config: LoginThrottleConfig,
}

impl<R: LoginAttemptRepository> LoginThrottleService<R> {
    pub fn new(repository: Arc<R>, config: LoginThrottleConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &LoginThrottleConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub async fn check_admission(&self, key: &str) -> Result<Admission, Error> {
        self.check_admission_at(key, Utc::now()).await
    }

    /// Decide whether `key` may attempt a login at `now`.
    ///
    /// A record whose window has elapsed is deleted here, so the next failure
    /// starts again from one.
    pub async fn check_admission_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Admission, Error> {
        if !self.config.enabled {
            return Ok(Admission::Allowed);
        }

        let Some(record) = self.repository.find(key).await? else {
            return Ok(Admission::Allowed);
        };

        if record.window_elapsed_at(&self.config, now) {
            self.repository.clear(key).await?;
            tracing::debug!(
                attempts = record.attempts,
                "Lockout window elapsed, login attempt counter reset"
            );
            return Ok(Admission::Allowed);
        }

        let admission = record.admission_at(&self.config, now);
        if let Admission::Denied { .. } = admission {
            tracing::warn!(
                attempts = record.attempts,
                retry_after_secs = admission.retry_after_secs(),
                "Login attempt rejected while locked out"
            );
        }
        Ok(admission)
    }

    pub async fn state_at(&self, key: &str, now: DateTime<Utc>) -> Result<ThrottleState, Error> {
        Ok(match self.repository.find(key).await? {
            Some(record) => record.state_at(&self.config, now),
            None => ThrottleState::Clear,
        })
    }

    pub async fn record_failure(&self, key: &str) -> Result<LoginAttemptRecord, Error> {
        self.record_failure_at(key, Utc::now()).await
    }

    /// Count one failed login. Returns the updated record.
    pub async fn record_failure_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginAttemptRecord, Error> {
        if !self.config.enabled {
            return Ok(LoginAttemptRecord {
                key: key.to_string(),
                attempts: 0,
                last_failure_at: now,
            });
        }

        let record = self
            .repository
            .record_failure(key, now, now - self.config.lockout_window)
            .await?;

        if record.attempts == self.config.max_failed_attempts {
            tracing::warn!(
                attempts = record.attempts,
                lockout_secs = self.config.lockout_window.num_seconds(),
                "Too many failed logins, locking out session"
            );
        }

        Ok(record)
    }

    /// Reset the counter after a successful login.
    pub async fn record_success(&self, key: &str) -> Result<(), Error> {
        self.repository.clear(key).await
    }

    /// Delete records whose window has elapsed.
    pub async fn cleanup_stale(&self) -> Result<u64, Error> {
        self.repository
            .cleanup_stale(Utc::now() - self.config.lockout_window)
            .await
    }
}
