//! Sessions
//!
//! A [`Session`] is an explicit value threaded through every request: it is
//! loaded (or created) when the request arrives, handed to the services that
//! need it, and saved back afterwards. Nothing about it lives in ambient state.
//!
//! | Field             | Type                   | Description                                           |
//! | ----------------- | ---------------------- | ----------------------------------------------------- |
//! | `id`              | `SessionId`            | Opaque secret carried by the session cookie.          |
//! | `user_id`         | `Option<UserId>`       | Bound account; `None` while anonymous.                |
//! | `created_at`      | `DateTime`             | When this identifier was issued.                      |
//! | `last_activity`   | `DateTime`             | Start of the sliding idle timeout.                    |
//! | `csrf_secret`     | `Option<CsrfToken>`    | Anti-forgery secret, minted lazily.                   |
//! | `flash`           | `Option<FlashMessage>` | One-shot message for the next page.                   |
//! | `remember_digest` | `Option<String>`       | Digest of the remember-me token tied to this session. |
//!
//! Storage only ever sees the SHA-256 digest of the identifier.
use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    crypto::{generate_secure_token, hash_token},
    error::ValidationError,
    user::UserId,
};

/// Session identifier. The raw value is a bearer secret and is redacted from `Debug`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: &str) -> Self {
        SessionId(id.to_string())
    }

    pub fn new_random() -> Self {
        SessionId(generate_secure_token())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Storage key for this identifier.
    pub fn digest(&self) -> String {
        hash_token(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(..)")
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Per-session anti-forgery secret.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn new(token: &str) -> Self {
        CsrfToken(token.to_string())
    }

    pub fn new_random() -> Self {
        CsrfToken(generate_secure_token())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Warning,
    Info,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
            FlashKind::Warning => "warning",
            FlashKind::Info => "info",
        }
    }
}

impl FromStr for FlashKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(FlashKind::Success),
            "error" => Ok(FlashKind::Error),
            "warning" => Ok(FlashKind::Warning),
            "info" => Ok(FlashKind::Info),
            other => Err(ValidationError::InvalidField(format!(
                "Unknown flash kind: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub message: String,
}

impl FlashMessage {
    pub fn new(kind: FlashKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Info, message)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub csrf_secret: Option<CsrfToken>,
    pub flash: Option<FlashMessage>,
    pub remember_digest: Option<String>,
}

impl Session {
    /// A fresh anonymous session with a new random identifier.
    pub fn new_anonymous(now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new_random(),
            user_id: None,
            created_at: now,
            last_activity: now,
            csrf_secret: None,
            flash: None,
            remember_digest: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.user_id {
            Some(_) => SessionState::Authenticated,
            None => SessionState::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// True once more than `idle_timeout` has passed since the last activity.
    pub fn is_idle_expired_at(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        now - self.last_activity > idle_timeout
    }

    pub fn set_flash(&mut self, flash: FlashMessage) {
        self.flash = Some(flash);
    }

    /// Remove and return the pending flash message.
    pub fn take_flash(&mut self) -> Option<FlashMessage> {
        self.flash.take()
    }
}
