//! # Gatehouse
//!
//! Session, login and registration security for PropertyHub.
//!
//! Gatehouse owns everything between "a request arrived with some cookies"
//! and "this request belongs to user X": session lifecycle with a sliding
//! idle timeout, CSRF tokens, password login with per-session throttling,
//! remember-me tokens, registration and an activity audit trail.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatehouse::{ClientFingerprint, GatehouseBuilder, LoginRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gatehouse = GatehouseBuilder::new()
//!         .with_sqlite("sqlite://gatehouse.db?mode=rwc")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let client = ClientFingerprint::default();
//!     let resumed = gatehouse.resume(None, None, &client).await?;
//!     let mut session = resumed.session;
//!     let csrf = gatehouse.issue_csrf(&mut session).await?;
//!
//!     let request = LoginRequest {
//!         email: "buyer@example.com".to_string(),
//!         password: "Secret123".to_string(),
//!         remember_me: false,
//!     };
//!     let outcome = gatehouse
//!         .login(&session, &request, Some(csrf.as_str()), &client)
//!         .await?;
//!     println!("signed in as {}", outcome.user.full_name);
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use gatehouse_core::{
    RepositoryProvider,
    services::{AuthenticationService, CleanupReport},
};
use tokio::{sync::watch, task::JoinHandle};

pub mod builder;
pub mod config;

pub use builder::{GatehouseBuilder, GatehouseBuilderError, NoStorage, WithStorage};
pub use config::GatehouseConfig;

/// Re-export core types
pub use gatehouse_core::{
    AccountType, ActivityAction, ActivityLogEntry, AuthError, ClientFingerprint, Credential,
    CsrfToken, Error, FlashKind, FlashMessage, LoginOutcome, LoginRequest, Registration,
    ResumeOutcome, Session, SessionError, SessionId, SessionState, UserId, ValidationError,
    services::{LOGGED_OUT_MESSAGE, LOGIN_REQUIRED_MESSAGE, REGISTERED_MESSAGE, RememberMeHandle},
};

#[cfg(feature = "sqlite")]
pub use gatehouse_storage_sqlite::{SqliteRepositoryProvider, SqliteStorage};

/// Entry point for applications.
///
/// Cheap to clone; clones share the same services and storage.
pub struct Gatehouse<R: RepositoryProvider> {
    repositories: Arc<R>,
    auth: Arc<AuthenticationService<R>>,
    config: Arc<GatehouseConfig>,
}

impl<R: RepositoryProvider> Clone for Gatehouse<R> {
    fn clone(&self) -> Self {
        Self {
            repositories: self.repositories.clone(),
            auth: self.auth.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: RepositoryProvider> Gatehouse<R> {
    pub fn new(repositories: Arc<R>, config: GatehouseConfig) -> Result<Self, Error> {
        let auth = AuthenticationService::new(repositories.clone(), config.auth_config())?;
        Ok(Self {
            repositories,
            auth: Arc::new(auth),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &GatehouseConfig {
        &self.config
    }

    /// Direct access to the underlying services.
    pub fn auth(&self) -> &AuthenticationService<R> {
        &self.auth
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Load or create the session for a request, honouring a remember-me cookie.
    pub async fn resume(
        &self,
        session_id: Option<&SessionId>,
        remember_token: Option<&str>,
        client: &ClientFingerprint,
    ) -> Result<ResumeOutcome, Error> {
        self.auth.resume(session_id, remember_token, client).await
    }

    pub async fn issue_csrf(&self, session: &mut Session) -> Result<CsrfToken, Error> {
        self.auth.issue_csrf(session).await
    }

    pub fn verify_csrf(&self, session: &Session, candidate: Option<&str>) -> bool {
        self.auth.verify_csrf(session, candidate)
    }

    pub async fn save_session(&self, session: &Session) -> Result<(), Error> {
        self.auth.sessions().save(session).await
    }

    pub async fn login(
        &self,
        session: &Session,
        request: &LoginRequest,
        csrf_token: Option<&str>,
        client: &ClientFingerprint,
    ) -> Result<LoginOutcome, Error> {
        self.auth.login(session, request, csrf_token, client).await
    }

    pub async fn logout(
        &self,
        session: Session,
        remember_token: Option<&str>,
        client: &ClientFingerprint,
    ) -> Result<Session, Error> {
        self.auth.logout(session, remember_token, client).await
    }

    pub async fn register(
        &self,
        session: &mut Session,
        registration: &Registration,
        csrf_token: Option<&str>,
        client: &ClientFingerprint,
    ) -> Result<Credential, Error> {
        self.auth
            .register(session, registration, csrf_token, client)
            .await
    }

    pub async fn current_user(&self, session: &Session) -> Result<Option<Credential>, Error> {
        self.auth.current_user(session).await
    }

    pub async fn deactivate_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.auth.deactivate_user(user_id).await
    }

    pub async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<(u64, u64), Error> {
        self.auth.revoke_all_for_user(user_id).await
    }

    pub async fn recent_activity(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, Error> {
        self.auth.activity().recent_for_user(user_id, limit).await
    }

    /// Run one sweep of idle sessions, stale throttle records and expired
    /// remember-me tokens.
    pub async fn cleanup(&self) -> Result<CleanupReport, Error> {
        self.auth.cleanup().await
    }

    /// Sweep expired state every `cleanup_interval` until `shutdown` changes.
    pub fn start_maintenance_task(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let auth = Arc::clone(&self.auth);
        let interval = self.config.cleanup_interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        match auth.cleanup().await {
                            Ok(report) if report != CleanupReport::default() => {
                                tracing::info!(
                                    sessions = report.sessions,
                                    login_attempts = report.login_attempts,
                                    remember_tokens = report.remember_tokens,
                                    "Cleaned up expired authentication state"
                                );
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    "Failed to clean up expired authentication state"
                                );
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down maintenance task");
                        break;
                    }
                }
            }
        })
    }
}
