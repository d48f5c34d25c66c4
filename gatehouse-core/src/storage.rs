//! Records persisted by the repositories that are not sessions or credentials.
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::LoginThrottleConfig, error::ValidationError, id::generate_prefixed_id, user::UserId,
};

/// Consecutive failed logins for one throttle key (the pre-authentication
/// session's identifier digest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttemptRecord {
    pub key: String,
    pub attempts: u32,
    pub last_failure_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    /// No failures on record.
    Clear,
    /// Some failures, below the threshold.
    Accumulating,
    /// At or above the threshold and still inside the window.
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    /// Whole seconds until retry, rounded up. Zero when allowed.
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Admission::Allowed => 0,
            Admission::Denied { retry_after } => {
                let millis = retry_after.num_milliseconds().max(0) as u64;
                millis.div_ceil(1000)
            }
        }
    }
}

impl LoginAttemptRecord {
    /// Whether the window has run out since the last failure. Once it has,
    /// the record counts as zero.
    pub fn window_elapsed_at(&self, config: &LoginThrottleConfig, now: DateTime<Utc>) -> bool {
        now - self.last_failure_at >= config.lockout_window
    }

    pub fn state_at(&self, config: &LoginThrottleConfig, now: DateTime<Utc>) -> ThrottleState {
        if self.attempts == 0 || self.window_elapsed_at(config, now) {
            ThrottleState::Clear
        } else if self.attempts >= config.max_failed_attempts {
            ThrottleState::Locked
        } else {
            ThrottleState::Accumulating
        }
    }

    pub fn admission_at(&self, config: &LoginThrottleConfig, now: DateTime<Utc>) -> Admission {
        match self.state_at(config, now) {
            ThrottleState::Locked => Admission::Denied {
                retry_after: config.lockout_window - (now - self.last_failure_at),
            },
            ThrottleState::Clear | ThrottleState::Accumulating => Admission::Allowed,
        }
    }
}

/// Network origin of a request. Recorded for auditing only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFingerprint {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientFingerprint {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// Stored form of a remember-me token. The raw value is never persisted.
#[derive(Debug, Clone)]
pub struct RememberMeToken {
    pub token_hash: String,
    pub user_id: UserId,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RememberMeToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Login,
    RememberLogin,
    Logout,
    Register,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Login => "login",
            ActivityAction::RememberLogin => "remember_login",
            ActivityAction::Logout => "logout",
            ActivityAction::Register => "register",
        }
    }
}

impl FromStr for ActivityAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(ActivityAction::Login),
            "remember_login" => Ok(ActivityAction::RememberLogin),
            "logout" => Ok(ActivityAction::Logout),
            "register" => Ok(ActivityAction::Register),
            other => Err(ValidationError::InvalidField(format!(
                "Unknown activity action: {other}"
            ))),
        }
    }
}

/// Audit trail row.
#[derive(Debug, Clone)]
pub struct ActivityLogEntry {
    pub id: String,
    pub user_id: UserId,
    pub action: ActivityAction,
    pub details: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(
        user_id: UserId,
        action: ActivityAction,
        details: impl Into<String>,
        client: &ClientFingerprint,
    ) -> Self {
        Self {
            id: generate_prefixed_id("act"),
            user_id,
            action,
            details: details.into(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            created_at: Utc::now(),
        }
    }
}
