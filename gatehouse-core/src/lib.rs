//! Core types and services for gatehouse.
//!
//! This crate holds the domain model (credentials, sessions, throttle
//! records, remember-me tokens, activity entries), the repository traits a
//! storage backend implements, and the services that run the login, logout,
//! registration and session-resume flows on top of them.
//!
//! Applications normally use the `gatehouse` crate, which wires a storage
//! backend into [`services::AuthenticationService`].
pub mod config;
pub mod crypto;
pub mod error;
pub mod id;
pub mod repositories;
pub mod services;
pub mod session;
pub mod storage;
pub mod user;
pub mod validation;

pub use config::{
    AuthConfig, LoginThrottleConfig, PasswordConfig, RememberMeConfig, SessionConfig,
};
pub use error::{AuthError, CryptoError, Error, SessionError, StorageError, ValidationError};
pub use repositories::RepositoryProvider;
pub use services::{
    AuthenticationService, HashedCredential, LoginOutcome, LoginRequest, Registration,
    ResumeOutcome,
};
pub use session::{CsrfToken, FlashKind, FlashMessage, Session, SessionId, SessionState};
pub use storage::{ActivityAction, ActivityLogEntry, Admission, ClientFingerprint, ThrottleState};
pub use user::{AccountType, Credential, NewCredential, UserId};
