pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Failures of the login, logout and registration flows.
///
/// `InvalidCredentials` deliberately covers both "no such account" and
/// "wrong password" so the two cannot be told apart by a client.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid security token. Please try again.")]
    SecurityTokenInvalid,

    #[error("Too many failed login attempts. Please try again in {}.", retry_after_text(.retry_after_secs))]
    TooManyAttempts { retry_after_secs: u64 },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Your account has been deactivated. Please contact support.")]
    AccountDisabled,

    #[error("Email already registered. Please login or use another email.")]
    EmailAlreadyRegistered,
}

fn retry_after_text(secs: &u64) -> String {
    match secs.div_ceil(60).max(1) {
        1 => "1 minute".to_string(),
        minutes => format!("{minutes} minutes"),
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,

    #[error("Session is not authenticated")]
    NotAuthenticated,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("{}", join_messages(.0))]
    Multiple(Vec<ValidationError>),
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Flatten into the individual messages, one per failed rule.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ValidationError::Multiple(errors) => {
                errors.iter().flat_map(ValidationError::messages).collect()
            }
            other => vec![other.to_string()],
        }
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl Error {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Storage failures are fatal to the request and must be reported as a
    /// generic server error.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, Error::Session(_))
    }

    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Error::Crypto(_))
    }

    /// Seconds until a throttled client may retry, if this is a lockout.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Error::Auth(AuthError::TooManyAttempts { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let auth_error = Error::Auth(AuthError::InvalidCredentials);
        assert_eq!(
            auth_error.to_string(),
            "Authentication error: Invalid email or password"
        );

        let storage_error = Error::Storage(StorageError::NotFound);
        assert_eq!(storage_error.to_string(), "Storage error: Record not found");
    }

    #[test]
    fn test_too_many_attempts_rounds_up_to_minutes() {
        let err = AuthError::TooManyAttempts {
            retry_after_secs: 895,
        };
        assert_eq!(
            err.to_string(),
            "Too many failed login attempts. Please try again in 15 minutes."
        );

        let err = AuthError::TooManyAttempts {
            retry_after_secs: 5,
        };
        assert_eq!(
            err.to_string(),
            "Too many failed login attempts. Please try again in 1 minute."
        );
    }

    #[test]
    fn test_retry_after_secs() {
        let err: Error = AuthError::TooManyAttempts {
            retry_after_secs: 120,
        }
        .into();
        assert_eq!(err.retry_after_secs(), Some(120));
        assert_eq!(
            Error::Auth(AuthError::InvalidCredentials).retry_after_secs(),
            None
        );
    }

    #[test]
    fn test_multiple_validation_messages() {
        let err = ValidationError::Multiple(vec![
            ValidationError::InvalidName("Full name must be at least 3 characters long".into()),
            ValidationError::InvalidPassword("Passwords do not match".into()),
        ]);
        assert_eq!(
            err.messages(),
            vec![
                "Invalid name: Full name must be at least 3 characters long".to_string(),
                "Invalid password: Passwords do not match".to_string(),
            ]
        );
        assert!(err.to_string().contains("; "));
    }

    #[test]
    fn test_error_categories() {
        assert!(Error::Auth(AuthError::AccountDisabled).is_auth_error());
        assert!(Error::Storage(StorageError::Connection("refused".into())).is_storage_error());
        assert!(Error::Session(SessionError::Expired).is_session_error());
        assert!(Error::Crypto(CryptoError::PasswordHash("bad params".into())).is_crypto_error());
        assert!(
            Error::Validation(ValidationError::MissingField("Email is required".into()))
                .is_validation_error()
        );
        assert!(!Error::Auth(AuthError::InvalidCredentials).is_storage_error());
    }
}
