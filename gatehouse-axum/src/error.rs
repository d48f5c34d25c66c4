use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use gatehouse_core::{Error, SessionError, error::AuthError as CoreAuthError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid security token. Please try again.")]
    SecurityTokenInvalid,

    #[error("{message}")]
    TooManyAttempts {
        message: String,
        retry_after_secs: u64,
    },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Your account has been deactivated. Please contact support.")]
    AccountDisabled,

    #[error("Email already registered. Please login or use another email.")]
    EmailAlreadyRegistered,

    #[error("{}", .0.join(" "))]
    Validation(Vec<String>),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<Error> for AuthError {
    fn from(err: Error) -> Self {
        match err {
            Error::Auth(CoreAuthError::SecurityTokenInvalid) => AuthError::SecurityTokenInvalid,
            Error::Auth(CoreAuthError::TooManyAttempts { retry_after_secs }) => {
                AuthError::TooManyAttempts {
                    message: CoreAuthError::TooManyAttempts { retry_after_secs }.to_string(),
                    retry_after_secs,
                }
            }
            Error::Auth(CoreAuthError::InvalidCredentials) => AuthError::InvalidCredentials,
            Error::Auth(CoreAuthError::AccountDisabled) => AuthError::AccountDisabled,
            Error::Auth(CoreAuthError::EmailAlreadyRegistered) => {
                AuthError::EmailAlreadyRegistered
            }
            Error::Validation(e) => AuthError::Validation(e.messages()),
            Error::Session(SessionError::NotAuthenticated | SessionError::Expired) => {
                AuthError::Unauthorized
            }
            other => AuthError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::SecurityTokenInvalid => StatusCode::FORBIDDEN,
            AuthError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::AccountDisabled => StatusCode::FORBIDDEN,
            AuthError::EmailAlreadyRegistered => StatusCode::CONFLICT,
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AuthError::InternalError(detail) => {
                tracing::error!(error = %detail, "Request failed");
                json!({ "error": "Internal server error", "code": status.as_u16() })
            }
            AuthError::Validation(errors) => json!({
                "error": self.to_string(),
                "errors": errors,
                "code": status.as_u16()
            }),
            _ => json!({ "error": self.to_string(), "code": status.as_u16() }),
        };

        let mut response = (status, Json(body)).into_response();
        if let AuthError::TooManyAttempts {
            retry_after_secs, ..
        } = self
        {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs),
            );
        }
        response
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::{StorageError, ValidationError};

    #[test]
    fn test_lockout_maps_to_429_with_retry_after() {
        let err: AuthError = Error::Auth(CoreAuthError::TooManyAttempts {
            retry_after_secs: 895,
        })
        .into();
        assert!(err.to_string().starts_with("Too many failed login attempts"));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "895");
    }

    #[test]
    fn test_storage_errors_are_opaque() {
        let err: AuthError =
            Error::Storage(StorageError::Connection("db.internal:5432 refused".into())).into();
        assert!(matches!(err, AuthError::InternalError(_)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_errors_keep_every_message() {
        let err: AuthError = Error::Validation(ValidationError::Multiple(vec![
            ValidationError::InvalidName("Full name must be at least 3 characters long".into()),
            ValidationError::InvalidPassword("Passwords do not match".into()),
        ]))
        .into();
        let AuthError::Validation(messages) = &err else {
            panic!("expected validation error");
        };
        assert_eq!(messages.len(), 2);
    }
}
