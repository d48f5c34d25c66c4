//! Login, logout, registration and session resumption.
//!
//! [`AuthenticationService`] ties the lower-level services together and owns
//! the order in which checks happen. Every flow takes the caller's current
//! [`Session`] and hands back the session the caller must use from then on.

use std::sync::Arc;

use crate::{
    Error,
    config::AuthConfig,
    crypto::hash_token,
    error::{AuthError, SessionError, StorageError},
    repositories::{
        ActivityRepositoryAdapter, CredentialRepository, CredentialRepositoryAdapter,
        LoginAttemptRepositoryAdapter, RememberMeRepositoryAdapter, RepositoryProvider,
        SessionRepositoryAdapter,
    },
    services::{
        activity::ActivityLogService,
        csrf::CsrfService,
        login_throttle::LoginThrottleService,
        password::PasswordHasher,
        remember_me::{RememberMeHandle, RememberMeResolution, RememberMeService},
        session::SessionManager,
    },
    session::{CsrfToken, FlashMessage, Session, SessionId},
    storage::{ActivityAction, Admission, ClientFingerprint},
    user::{AccountType, Credential, NewCredential, UserId},
    validation::{normalize_phone, validate_login_fields, validate_registration},
};

pub const LOGGED_OUT_MESSAGE: &str = "You have been logged out successfully!";
pub const REGISTERED_MESSAGE: &str = "Registration successful! Please login.";
pub const LOGIN_REQUIRED_MESSAGE: &str = "Please login to continue";

fn welcome_message(full_name: &str) -> String {
    format!("Welcome back, {full_name}!")
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A submitted login form.
#[derive(Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"..")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

#[derive(Debug)]
pub struct LoginOutcome {
    /// The regenerated, authenticated session. The previous identifier is dead.
    pub session: Session,
    pub user: Credential,
    /// Present when the user asked to be remembered.
    pub remember_me: Option<RememberMeHandle>,
}

/// A submitted registration form.
#[derive(Clone)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
    pub account_type: AccountType,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("account_type", &self.account_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct ResumeOutcome {
    pub session: Session,
    /// The session was authenticated from a remember-me token on this request.
    pub restored_from_remember_me: bool,
    /// The presented remember-me cookie is dead and should be removed.
    pub clear_remember_cookie: bool,
}

pub struct AuthenticationService<R: RepositoryProvider> {
    credentials: Arc<CredentialRepositoryAdapter<R>>,
    sessions: SessionManager<SessionRepositoryAdapter<R>>,
    throttle: LoginThrottleService<LoginAttemptRepositoryAdapter<R>>,
    remember_me: RememberMeService<RememberMeRepositoryAdapter<R>>,
    activity: ActivityLogService<ActivityRepositoryAdapter<R>>,
    passwords: PasswordHasher,
    csrf: CsrfService,
}

impl<R: RepositoryProvider> AuthenticationService<R> {
    pub fn new(repositories: Arc<R>, config: AuthConfig) -> Result<Self, Error> {
        Ok(Self {
            credentials: Arc::new(CredentialRepositoryAdapter::new(repositories.clone())),
            sessions: SessionManager::new(
                Arc::new(SessionRepositoryAdapter::new(repositories.clone())),
                config.session,
            ),
            throttle: LoginThrottleService::new(
                Arc::new(LoginAttemptRepositoryAdapter::new(repositories.clone())),
                config.login_throttle,
            ),
            remember_me: RememberMeService::new(
                Arc::new(RememberMeRepositoryAdapter::new(repositories.clone())),
                config.remember_me,
            ),
            activity: ActivityLogService::new(Arc::new(ActivityRepositoryAdapter::new(
                repositories,
            ))),
            passwords: PasswordHasher::new(&config.password)?,
            csrf: CsrfService::new(),
        })
    }

    pub fn sessions(&self) -> &SessionManager<SessionRepositoryAdapter<R>> {
        &self.sessions
    }

    pub fn throttle(&self) -> &LoginThrottleService<LoginAttemptRepositoryAdapter<R>> {
        &self.throttle
    }

    pub fn remember_me(&self) -> &RememberMeService<RememberMeRepositoryAdapter<R>> {
        &self.remember_me
    }

    pub fn activity(&self) -> &ActivityLogService<ActivityRepositoryAdapter<R>> {
        &self.activity
    }

    pub fn passwords(&self) -> &PasswordHasher {
        &self.passwords
    }

    /// Return the CSRF token for forms rendered in this session, persisting a
    /// newly minted one.
    pub async fn issue_csrf(&self, session: &mut Session) -> Result<CsrfToken, Error> {
        let had_secret = session.csrf_secret.is_some();
        let token = self.csrf.issue(session);
        if !had_secret {
            self.sessions.save(session).await?;
        }
        Ok(token)
    }

    pub fn verify_csrf(&self, session: &Session, candidate: Option<&str>) -> bool {
        self.csrf.verify(session, candidate)
    }

    fn require_csrf(&self, session: &Session, candidate: Option<&str>) -> Result<(), Error> {
        if self.csrf.verify(session, candidate) {
            Ok(())
        } else {
            tracing::warn!("Rejected request with invalid CSRF token");
            Err(AuthError::SecurityTokenInvalid.into())
        }
    }

    /// Attempt a password login.
    ///
    /// Checks run in a fixed order: CSRF, required fields, throttle, account
    /// lookup, active flag, password. On success the old session identifier
    /// is invalidated and the returned session replaces it. On failure
    /// `session` is left as it was.
    pub async fn login(
        &self,
        session: &Session,
        request: &LoginRequest,
        csrf_token: Option<&str>,
        client: &ClientFingerprint,
    ) -> Result<LoginOutcome, Error> {
        self.require_csrf(session, csrf_token)?;
        validate_login_fields(&request.email, &request.password)?;

        let throttle_key = session.id.digest();
        let admission = self.throttle.check_admission(&throttle_key).await?;
        if let Admission::Denied { .. } = admission {
            return Err(AuthError::TooManyAttempts {
                retry_after_secs: admission.retry_after_secs(),
            }
            .into());
        }

        let email = normalize_email(&request.email);
        let Some(user) = self.credentials.find_by_email(&email).await? else {
            self.passwords.verify_dummy(&request.password);
            let record = self.throttle.record_failure(&throttle_key).await?;
            tracing::info!(attempts = record.attempts, "Login failed: unknown account");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login refused for deactivated account");
            return Err(AuthError::AccountDisabled.into());
        }

        if !self.passwords.verify(&request.password, &user.password_hash) {
            let record = self.throttle.record_failure(&throttle_key).await?;
            tracing::info!(
                user_id = %user.id,
                attempts = record.attempts,
                "Login failed: wrong password"
            );
            return Err(AuthError::InvalidCredentials.into());
        }

        self.throttle.record_success(&throttle_key).await?;

        let mut authenticated = self.sessions.authenticate(session.clone(), &user.id).await?;

        let remember_me = if request.remember_me {
            match self.remember_me.issue(&user.id, client).await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    self.abandon_login(authenticated, None).await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        authenticated.remember_digest = remember_me.as_ref().map(|h| h.record.token_hash.clone());
        authenticated.set_flash(FlashMessage::success(welcome_message(&user.full_name)));
        if let Err(e) = self.sessions.save(&authenticated).await {
            self.abandon_login(authenticated, remember_me.as_ref()).await;
            return Err(e);
        }

        self.activity
            .log(&user.id, ActivityAction::Login, "User logged in", client)
            .await;
        tracing::info!(
            user_id = %user.id,
            remember_me = request.remember_me,
            "User logged in"
        );

        Ok(LoginOutcome {
            session: authenticated,
            user,
            remember_me,
        })
    }

    /// Undo a login that failed after the session was regenerated. Cleanup
    /// failures are logged; the caller reports the original error.
    async fn abandon_login(&self, session: Session, remember_me: Option<&RememberMeHandle>) {
        if let Some(handle) = remember_me {
            if let Err(e) = self.remember_me.revoke_digest(&handle.record.token_hash).await {
                tracing::warn!(error = %e, "Failed to revoke remember-me token of abandoned login");
            }
        }
        if let Err(e) = self.sessions.destroy(session).await {
            tracing::warn!(error = %e, "Failed to discard session of abandoned login");
        }
    }

    /// End the session and revoke the remember-me token tied to it.
    ///
    /// Returns a fresh anonymous session. When the old one was
    /// authenticated the new one carries the logged-out flash.
    pub async fn logout(
        &self,
        session: Session,
        remember_token: Option<&str>,
        client: &ClientFingerprint,
    ) -> Result<Session, Error> {
        if let Some(value) = remember_token {
            self.remember_me.revoke(value).await?;
        }
        if let Some(digest) = &session.remember_digest {
            self.remember_me.revoke_digest(digest).await?;
        }

        let user_id = session.user_id.clone();
        self.sessions.destroy(session).await?;

        let flash = match &user_id {
            Some(user_id) => {
                self.activity
                    .log(user_id, ActivityAction::Logout, "User logged out", client)
                    .await;
                tracing::info!(user_id = %user_id, "User logged out");
                Some(FlashMessage::success(LOGGED_OUT_MESSAGE))
            }
            None => None,
        };

        self.sessions.start(flash).await
    }

    /// Resolve the session for an incoming request.
    ///
    /// An anonymous session is upgraded when the request carries a valid
    /// remember-me token for an active account. A token that is unknown,
    /// expired, or belongs to a missing or deactivated account is reported
    /// through `clear_remember_cookie`.
    pub async fn resume(
        &self,
        session_id: Option<&SessionId>,
        remember_token: Option<&str>,
        client: &ClientFingerprint,
    ) -> Result<ResumeOutcome, Error> {
        let mut session = self.sessions.resume_or_create(session_id).await?;

        let Some(value) = remember_token.filter(|_| !session.is_authenticated()) else {
            return Ok(ResumeOutcome {
                session,
                restored_from_remember_me: false,
                clear_remember_cookie: false,
            });
        };

        let user = match self.remember_me.resolve(value).await? {
            RememberMeResolution::Valid(user_id) => self.credentials.find_by_id(&user_id).await?,
            RememberMeResolution::NotFound | RememberMeResolution::Expired => {
                return Ok(ResumeOutcome {
                    session,
                    restored_from_remember_me: false,
                    clear_remember_cookie: true,
                });
            }
        };

        let Some(user) = user.filter(|u| u.is_active) else {
            self.remember_me.revoke(value).await?;
            tracing::info!("Remember-me token refused for missing or deactivated account");
            return Ok(ResumeOutcome {
                session,
                restored_from_remember_me: false,
                clear_remember_cookie: true,
            });
        };

        // An expiry notice is moot once the user is signed straight back in.
        session.take_flash();
        let mut restored = self.sessions.authenticate(session, &user.id).await?;
        restored.remember_digest = Some(hash_token(value));
        self.sessions.save(&restored).await?;

        self.activity
            .log(
                &user.id,
                ActivityAction::RememberLogin,
                "User logged in via remember-me token",
                client,
            )
            .await;
        tracing::info!(user_id = %user.id, "Session restored from remember-me token");

        Ok(ResumeOutcome {
            session: restored,
            restored_from_remember_me: true,
            clear_remember_cookie: false,
        })
    }

    /// Create an account. The user still has to log in afterwards.
    pub async fn register(
        &self,
        session: &mut Session,
        registration: &Registration,
        csrf_token: Option<&str>,
        client: &ClientFingerprint,
    ) -> Result<Credential, Error> {
        self.require_csrf(session, csrf_token)?;
        validate_registration(
            &registration.full_name,
            &registration.email,
            &registration.phone,
            &registration.password,
            &registration.confirm_password,
        )?;

        let email = normalize_email(&registration.email);
        if self.credentials.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyRegistered.into());
        }

        let new_credential = NewCredential::builder()
            .full_name(registration.full_name.trim())
            .email(email)
            .phone(Some(normalize_phone(&registration.phone)))
            .account_type(registration.account_type)
            .password_hash(self.passwords.hash(&registration.password)?)
            .build()?;

        let credential = match self.credentials.create(new_credential).await {
            Ok(credential) => credential,
            Err(Error::Storage(StorageError::Constraint(_))) => {
                return Err(AuthError::EmailAlreadyRegistered.into());
            }
            Err(e) => return Err(e),
        };

        session.set_flash(FlashMessage::success(REGISTERED_MESSAGE));
        self.sessions.save(session).await?;

        self.activity
            .log(
                &credential.id,
                ActivityAction::Register,
                "New account registered",
                client,
            )
            .await;
        tracing::info!(
            user_id = %credential.id,
            account_type = credential.account_type.as_str(),
            "User registered"
        );

        Ok(credential)
    }

    /// The authenticated user's id, or `NotAuthenticated`.
    pub fn require_authenticated<'a>(&self, session: &'a Session) -> Result<&'a UserId, Error> {
        session
            .user_id
            .as_ref()
            .ok_or_else(|| SessionError::NotAuthenticated.into())
    }

    pub async fn current_user(&self, session: &Session) -> Result<Option<Credential>, Error> {
        match &session.user_id {
            Some(user_id) => self.credentials.find_by_id(user_id).await,
            None => Ok(None),
        }
    }

    /// Deactivate an account and end all of its sessions and remembered logins.
    pub async fn deactivate_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.credentials.set_active(user_id, false).await?;
        self.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, "Account deactivated");
        Ok(())
    }

    pub async fn activate_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.credentials.set_active(user_id, true).await
    }

    /// Sign a user out everywhere. Returns `(sessions, remember_tokens)` removed.
    pub async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<(u64, u64), Error> {
        let sessions = self.sessions.destroy_all_for_user(user_id).await?;
        let tokens = self.remember_me.revoke_all_for_user(user_id).await?;
        Ok((sessions, tokens))
    }

    /// Delete idle sessions, stale throttle counters and expired remember-me tokens.
    pub async fn cleanup(&self) -> Result<CleanupReport, Error> {
        let report = CleanupReport {
            sessions: self.sessions.cleanup_idle().await?,
            login_attempts: self.throttle.cleanup_stale().await?,
            remember_tokens: self.remember_me.cleanup_expired().await?,
        };
        tracing::debug!(
            sessions = report.sessions,
            login_attempts = report.login_attempts,
            remember_tokens = report.remember_tokens,
            "Cleanup finished"
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub sessions: u64,
    pub login_attempts: u64,
    pub remember_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PasswordConfig, error::ValidationError, repositories::InMemoryRepositoryProvider,
        session::SessionState, storage::ThrottleState,
    };
    use chrono::Utc;

    const PASSWORD: &str = "Str0ngPassword";

    fn service() -> AuthenticationService<InMemoryRepositoryProvider> {
        let config = AuthConfig {
            password: PasswordConfig::low_cost(),
            ..AuthConfig::default()
        };
        AuthenticationService::new(Arc::new(InMemoryRepositoryProvider::new()), config).unwrap()
    }

    fn client() -> ClientFingerprint {
        ClientFingerprint::new(Some("203.0.113.9".into()), Some("Mozilla/5.0".into()))
    }

    async fn fresh_session(auth: &AuthenticationService<InMemoryRepositoryProvider>) -> (Session, CsrfToken) {
        let mut session = auth.sessions().resume_or_create(None).await.unwrap();
        let token = auth.issue_csrf(&mut session).await.unwrap();
        (session, token)
    }

    fn registration(email: &str) -> Registration {
        Registration {
            full_name: "Ayesha Khan".to_string(),
            email: email.to_string(),
            phone: "+923001234567".to_string(),
            password: PASSWORD.to_string(),
            confirm_password: PASSWORD.to_string(),
            account_type: AccountType::Buyer,
        }
    }

    async fn registered(
        auth: &AuthenticationService<InMemoryRepositoryProvider>,
        email: &str,
    ) -> Credential {
        let (mut session, token) = fresh_session(auth).await;
        auth.register(&mut session, &registration(email), Some(token.as_str()), &client())
            .await
            .unwrap()
    }

    fn login_request(email: &str, password: &str, remember_me: bool) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            remember_me,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();
        let user = registered(&auth, "Ayesha@Example.com").await;
        assert_eq!(user.email, "ayesha@example.com");

        let (session, token) = fresh_session(&auth).await;
        let old_id = session.id.clone();
        let outcome = auth
            .login(
                &session,
                &login_request(" AYESHA@example.com ", PASSWORD, false),
                Some(token.as_str()),
                &client(),
            )
            .await
            .unwrap();

        let mut session = outcome.session;
        assert_ne!(session.id, old_id);
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.user_id.as_ref(), Some(&user.id));
        assert!(outcome.remember_me.is_none());
        assert_eq!(session.take_flash().unwrap().message, "Welcome back, Ayesha Khan!");

        let resumed = auth
            .resume(Some(&old_id), None, &client())
            .await
            .unwrap();
        assert_ne!(resumed.session.id, old_id);
        assert!(!resumed.session.is_authenticated());

        let entries = auth.activity().recent_for_user(&user.id, 10).await.unwrap();
        assert!(entries.iter().any(|e| e.action == ActivityAction::Login));
        assert!(entries.iter().any(|e| e.action == ActivityAction::Register));
    }

    #[tokio::test]
    async fn test_login_requires_csrf() {
        let auth = service();
        registered(&auth, "csrf@example.com").await;
        let (session, _) = fresh_session(&auth).await;

        let err = auth
            .login(
                &session,
                &login_request("csrf@example.com", PASSWORD, false),
                Some("forged"),
                &client(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::SecurityTokenInvalid)));

        let err = auth
            .login(
                &session,
                &login_request("csrf@example.com", PASSWORD, false),
                None,
                &client(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::SecurityTokenInvalid)));
    }

    #[tokio::test]
    async fn test_empty_fields_rejected_without_counting() {
        let auth = service();
        let (session, token) = fresh_session(&auth).await;

        let err = auth
            .login(&session, &login_request("", "", false), Some(token.as_str()), &client())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingField(_))
        ));
        assert_eq!(
            auth.throttle()
                .state_at(&session.id.digest(), Utc::now())
                .await
                .unwrap(),
            ThrottleState::Clear
        );
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let auth = service();
        registered(&auth, "known@example.com").await;
        let (session, token) = fresh_session(&auth).await;

        let unknown = auth
            .login(
                &session,
                &login_request("nobody@example.com", PASSWORD, false),
                Some(token.as_str()),
                &client(),
            )
            .await
            .unwrap_err();
        let wrong = auth
            .login(
                &session,
                &login_request("known@example.com", "Wr0ngPassword", false),
                Some(token.as_str()),
                &client(),
            )
            .await
            .unwrap_err();

        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(unknown, Error::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_lockout_after_five_failures() {
        let auth = service();
        registered(&auth, "locked@example.com").await;
        let (session, token) = fresh_session(&auth).await;

        for _ in 0..5 {
            let err = auth
                .login(
                    &session,
                    &login_request("locked@example.com", "Wr0ngPassword", false),
                    Some(token.as_str()),
                    &client(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
        }

        let err = auth
            .login(
                &session,
                &login_request("locked@example.com", PASSWORD, false),
                Some(token.as_str()),
                &client(),
            )
            .await
            .unwrap_err();
        assert!(err.retry_after_secs().is_some_and(|s| s > 0 && s <= 900));
        assert!(err.to_string().contains("15 minutes"));
    }

    #[tokio::test]
    async fn test_success_clears_failure_count() {
        let auth = service();
        registered(&auth, "reset@example.com").await;
        let (session, token) = fresh_session(&auth).await;

        for _ in 0..3 {
            let _ = auth
                .login(
                    &session,
                    &login_request("reset@example.com", "Wr0ngPassword", false),
                    Some(token.as_str()),
                    &client(),
                )
                .await;
        }
        auth.login(
            &session,
            &login_request("reset@example.com", PASSWORD, false),
            Some(token.as_str()),
            &client(),
        )
        .await
        .unwrap();

        assert_eq!(
            auth.throttle()
                .state_at(&session.id.digest(), Utc::now())
                .await
                .unwrap(),
            ThrottleState::Clear
        );
    }

    #[tokio::test]
    async fn test_deactivated_account_cannot_login() {
        let auth = service();
        let user = registered(&auth, "inactive@example.com").await;
        auth.deactivate_user(&user.id).await.unwrap();
        let (session, token) = fresh_session(&auth).await;

        let err = auth
            .login(
                &session,
                &login_request("inactive@example.com", PASSWORD, false),
                Some(token.as_str()),
                &client(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::AccountDisabled)));
    }

    #[tokio::test]
    async fn test_remember_me_restores_session() {
        let auth = service();
        let user = registered(&auth, "remember@example.com").await;
        let (session, token) = fresh_session(&auth).await;

        let outcome = auth
            .login(
                &session,
                &login_request("remember@example.com", PASSWORD, true),
                Some(token.as_str()),
                &client(),
            )
            .await
            .unwrap();
        let handle = outcome.remember_me.unwrap();
        assert_eq!(
            outcome.session.remember_digest.as_deref(),
            Some(handle.record.token_hash.as_str())
        );

        let resumed = auth
            .resume(None, Some(&handle.value), &client())
            .await
            .unwrap();
        assert!(resumed.restored_from_remember_me);
        assert!(!resumed.clear_remember_cookie);
        assert_eq!(resumed.session.user_id.as_ref(), Some(&user.id));

        let entries = auth.activity().recent_for_user(&user.id, 10).await.unwrap();
        assert!(entries.iter().any(|e| e.action == ActivityAction::RememberLogin));
    }

    mod failing_session_store {
        use super::*;
        use crate::repositories::{
            ActivityRepositoryProvider, CredentialRepositoryProvider,
            LoginAttemptRepositoryProvider, RememberMeRepositoryProvider, SessionRepository,
            SessionRepositoryProvider, memory::InMemorySessionRepository,
        };
        use async_trait::async_trait;
        use chrono::DateTime;
        use std::sync::atomic::{AtomicBool, Ordering};

        /// Session store whose `save` can be switched to fail.
        #[derive(Default)]
        pub struct FlakySessions {
            inner: InMemorySessionRepository,
            pub fail_saves: AtomicBool,
        }

        #[async_trait]
        impl SessionRepository for FlakySessions {
            async fn create(&self, session: &Session) -> Result<(), Error> {
                self.inner.create(session).await
            }

            async fn find(&self, id: &SessionId) -> Result<Option<Session>, Error> {
                self.inner.find(id).await
            }

            async fn save(&self, session: &Session) -> Result<(), Error> {
                if self.fail_saves.load(Ordering::SeqCst) {
                    return Err(Error::Storage(StorageError::Connection(
                        "database is locked".to_string(),
                    )));
                }
                self.inner.save(session).await
            }

            async fn touch(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), Error> {
                self.inner.touch(id, at).await
            }

            async fn delete(&self, id: &SessionId) -> Result<(), Error> {
                self.inner.delete(id).await
            }

            async fn delete_by_user_id(&self, user_id: &UserId) -> Result<u64, Error> {
                self.inner.delete_by_user_id(user_id).await
            }

            async fn cleanup_idle(&self, before: DateTime<Utc>) -> Result<u64, Error> {
                self.inner.cleanup_idle(before).await
            }
        }

        #[derive(Default)]
        pub struct FlakyProvider {
            inner: InMemoryRepositoryProvider,
            pub sessions: FlakySessions,
        }

        impl CredentialRepositoryProvider for FlakyProvider {
            type CredentialRepo =
                <InMemoryRepositoryProvider as CredentialRepositoryProvider>::CredentialRepo;

            fn credential(&self) -> &Self::CredentialRepo {
                self.inner.credential()
            }
        }

        impl SessionRepositoryProvider for FlakyProvider {
            type SessionRepo = FlakySessions;

            fn session(&self) -> &Self::SessionRepo {
                &self.sessions
            }
        }

        impl LoginAttemptRepositoryProvider for FlakyProvider {
            type LoginAttemptRepo =
                <InMemoryRepositoryProvider as LoginAttemptRepositoryProvider>::LoginAttemptRepo;

            fn login_attempt(&self) -> &Self::LoginAttemptRepo {
                self.inner.login_attempt()
            }
        }

        impl RememberMeRepositoryProvider for FlakyProvider {
            type RememberMeRepo =
                <InMemoryRepositoryProvider as RememberMeRepositoryProvider>::RememberMeRepo;

            fn remember_me(&self) -> &Self::RememberMeRepo {
                self.inner.remember_me()
            }
        }

        impl ActivityRepositoryProvider for FlakyProvider {
            type ActivityRepo =
                <InMemoryRepositoryProvider as ActivityRepositoryProvider>::ActivityRepo;

            fn activity(&self) -> &Self::ActivityRepo {
                self.inner.activity()
            }
        }

        #[async_trait]
        impl RepositoryProvider for FlakyProvider {
            async fn migrate(&self) -> Result<(), Error> {
                Ok(())
            }

            async fn health_check(&self) -> Result<(), Error> {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_failed_session_save_leaves_no_remember_token() {
        use crate::repositories::{RememberMeRepository, RememberMeRepositoryProvider};
        use std::sync::atomic::Ordering;

        let provider = Arc::new(failing_session_store::FlakyProvider::default());
        let config = AuthConfig {
            password: PasswordConfig::low_cost(),
            ..AuthConfig::default()
        };
        let auth = AuthenticationService::new(provider.clone(), config).unwrap();

        let mut session = auth.sessions().resume_or_create(None).await.unwrap();
        let token = auth.issue_csrf(&mut session).await.unwrap();
        let user = auth
            .register(&mut session, &registration("flaky@example.com"), Some(token.as_str()), &client())
            .await
            .unwrap();

        let mut session = auth.sessions().resume_or_create(None).await.unwrap();
        let token = auth.issue_csrf(&mut session).await.unwrap();
        provider.sessions.fail_saves.store(true, Ordering::SeqCst);

        let err = auth
            .login(
                &session,
                &login_request("flaky@example.com", PASSWORD, true),
                Some(token.as_str()),
                &client(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::Connection(_))));

        assert_eq!(
            provider
                .remember_me()
                .delete_by_user_id(&user.id)
                .await
                .unwrap(),
            0
        );
        assert_eq!(auth.sessions().destroy_all_for_user(&user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_remember_token_clears_cookie() {
        let auth = service();
        let resumed = auth
            .resume(None, Some("not-a-real-token"), &client())
            .await
            .unwrap();

        assert!(!resumed.session.is_authenticated());
        assert!(resumed.clear_remember_cookie);
    }

    #[tokio::test]
    async fn test_remember_token_for_deactivated_account_is_revoked() {
        let auth = service();
        let user = registered(&auth, "gone@example.com").await;
        let handle = auth.remember_me().issue(&user.id, &client()).await.unwrap();
        auth.credentials.set_active(&user.id, false).await.unwrap();

        let resumed = auth
            .resume(None, Some(&handle.value), &client())
            .await
            .unwrap();
        assert!(!resumed.session.is_authenticated());
        assert!(resumed.clear_remember_cookie);
        assert_eq!(
            auth.remember_me().resolve(&handle.value).await.unwrap(),
            RememberMeResolution::NotFound
        );
    }

    #[tokio::test]
    async fn test_logout_revokes_remember_token() {
        let auth = service();
        registered(&auth, "logout@example.com").await;
        let (session, token) = fresh_session(&auth).await;
        let outcome = auth
            .login(
                &session,
                &login_request("logout@example.com", PASSWORD, true),
                Some(token.as_str()),
                &client(),
            )
            .await
            .unwrap();
        let handle = outcome.remember_me.unwrap();
        let old_id = outcome.session.id.clone();

        let mut anonymous = auth
            .logout(outcome.session, None, &client())
            .await
            .unwrap();
        assert!(!anonymous.is_authenticated());
        assert_eq!(anonymous.take_flash().unwrap().message, LOGGED_OUT_MESSAGE);

        assert_eq!(
            auth.remember_me().resolve(&handle.value).await.unwrap(),
            RememberMeResolution::NotFound
        );
        let resumed = auth
            .resume(Some(&old_id), Some(&handle.value), &client())
            .await
            .unwrap();
        assert!(!resumed.session.is_authenticated());
        assert!(resumed.clear_remember_cookie);
    }

    #[tokio::test]
    async fn test_anonymous_logout_has_no_flash() {
        let auth = service();
        let (session, _) = fresh_session(&auth).await;
        let next = auth.logout(session, None, &client()).await.unwrap();
        assert!(next.flash.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let auth = service();
        registered(&auth, "dup@example.com").await;
        let (mut session, token) = fresh_session(&auth).await;

        let err = auth
            .register(
                &mut session,
                &registration("DUP@example.com"),
                Some(token.as_str()),
                &client(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::EmailAlreadyRegistered)));
    }

    #[tokio::test]
    async fn test_registration_reports_every_invalid_field() {
        let auth = service();
        let (mut session, token) = fresh_session(&auth).await;
        let form = Registration {
            full_name: "Al".to_string(),
            email: "not-an-email".to_string(),
            phone: "12".to_string(),
            password: "short".to_string(),
            confirm_password: "different".to_string(),
            account_type: AccountType::Seller,
        };

        let err = auth
            .register(&mut session, &form, Some(token.as_str()), &client())
            .await
            .unwrap_err();
        match err {
            Error::Validation(ValidationError::Multiple(errors)) => {
                assert_eq!(errors.len(), 5)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_registration_sets_flash() {
        let auth = service();
        let (mut session, token) = fresh_session(&auth).await;
        auth.register(
            &mut session,
            &registration("flash@example.com"),
            Some(token.as_str()),
            &client(),
        )
        .await
        .unwrap();

        let mut stored = auth
            .sessions()
            .resume_or_create(Some(&session.id))
            .await
            .unwrap();
        assert_eq!(stored.take_flash().unwrap().message, REGISTERED_MESSAGE);
    }

    #[tokio::test]
    async fn test_require_authenticated() {
        let auth = service();
        let (session, _) = fresh_session(&auth).await;
        let err = auth.require_authenticated(&session).unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_revoke_all_for_user() {
        let auth = service();
        let user = registered(&auth, "everywhere@example.com").await;
        for _ in 0..2 {
            let (session, token) = fresh_session(&auth).await;
            auth.login(
                &session,
                &login_request("everywhere@example.com", PASSWORD, true),
                Some(token.as_str()),
                &client(),
            )
            .await
            .unwrap();
        }

        assert_eq!(auth.revoke_all_for_user(&user.id).await.unwrap(), (2, 2));
    }
}
