//! Service layer for business logic
//!
//! Each service wraps one repository and one concern. [`AuthenticationService`]
//! composes them into the login, logout, resume and registration flows.

pub mod activity;
pub mod auth;
pub mod csrf;
pub mod login_throttle;
pub mod password;
pub mod remember_me;
pub mod session;

pub use activity::ActivityLogService;
pub use auth::{
    AuthenticationService, CleanupReport, LOGGED_OUT_MESSAGE, LOGIN_REQUIRED_MESSAGE,
    LoginOutcome, LoginRequest, REGISTERED_MESSAGE, Registration, ResumeOutcome,
};
pub use csrf::CsrfService;
pub use login_throttle::LoginThrottleService;
pub use password::{HashedCredential, PasswordHasher};
pub use remember_me::{RememberMeHandle, RememberMeResolution, RememberMeService};
pub use session::{SESSION_EXPIRED_MESSAGE, SessionManager};
