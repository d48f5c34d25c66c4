use chrono::Duration;
use gatehouse::{
    AccountType, ActivityAction, AuthError, ClientFingerprint, Error, FlashKind, Gatehouse,
    GatehouseBuilder, LOGGED_OUT_MESSAGE, LoginRequest, REGISTERED_MESSAGE, Registration, Session,
    SqliteRepositoryProvider,
};
use gatehouse_core::{LoginThrottleConfig, PasswordConfig};

const PASSWORD: &str = "Secret123";

async fn setup() -> Gatehouse<SqliteRepositoryProvider> {
    let _ = tracing_subscriber::fmt().try_init();
    GatehouseBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect")
        .with_password(PasswordConfig::low_cost())
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build gatehouse")
}

fn client() -> ClientFingerprint {
    ClientFingerprint::new(Some("203.0.113.7".into()), Some("Mozilla/5.0".into()))
}

fn registration(email: &str) -> Registration {
    Registration {
        full_name: "Bilal Ahmed".to_string(),
        email: email.to_string(),
        phone: "03001234567".to_string(),
        password: PASSWORD.to_string(),
        confirm_password: PASSWORD.to_string(),
        account_type: AccountType::Seller,
    }
}

fn login_request(email: &str, password: &str, remember_me: bool) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
        remember_me,
    }
}

async fn fresh_session(gatehouse: &Gatehouse<SqliteRepositoryProvider>) -> (Session, String) {
    let mut session = gatehouse
        .resume(None, None, &client())
        .await
        .unwrap()
        .session;
    let csrf = gatehouse.issue_csrf(&mut session).await.unwrap();
    (session, csrf.as_str().to_string())
}

async fn register(gatehouse: &Gatehouse<SqliteRepositoryProvider>, email: &str) {
    let (mut session, csrf) = fresh_session(gatehouse).await;
    gatehouse
        .register(&mut session, &registration(email), Some(&csrf), &client())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_login_logout() {
    let gatehouse = setup().await;
    gatehouse.health_check().await.unwrap();

    let (mut session, csrf) = fresh_session(&gatehouse).await;
    let user = gatehouse
        .register(
            &mut session,
            &registration("Bilal@Example.com"),
            Some(&csrf),
            &client(),
        )
        .await
        .unwrap();
    assert_eq!(user.email, "bilal@example.com");
    assert_eq!(user.phone.as_deref(), Some("03001234567"));
    assert_eq!(
        session.flash.as_ref().map(|f| f.message.as_str()),
        Some(REGISTERED_MESSAGE)
    );

    let outcome = gatehouse
        .login(
            &session,
            &login_request("bilal@example.com", PASSWORD, false),
            Some(&csrf),
            &client(),
        )
        .await
        .unwrap();
    assert_ne!(outcome.session.id.as_str(), session.id.as_str());
    assert_eq!(outcome.session.user_id.as_ref(), Some(&user.id));
    assert!(outcome.remember_me.is_none());

    // The pre-login identifier no longer resolves to anything authenticated.
    let stale = gatehouse
        .resume(Some(&session.id), None, &client())
        .await
        .unwrap();
    assert!(!stale.session.is_authenticated());

    let resumed = gatehouse
        .resume(Some(&outcome.session.id), None, &client())
        .await
        .unwrap();
    assert_eq!(resumed.session.user_id.as_ref(), Some(&user.id));
    let current = gatehouse.current_user(&resumed.session).await.unwrap();
    assert_eq!(current.map(|u| u.id), Some(user.id.clone()));

    let after_logout = gatehouse
        .logout(resumed.session, None, &client())
        .await
        .unwrap();
    assert!(!after_logout.is_authenticated());
    let flash = after_logout.flash.as_ref().unwrap();
    assert_eq!(flash.kind, FlashKind::Success);
    assert_eq!(flash.message, LOGGED_OUT_MESSAGE);

    let gone = gatehouse
        .resume(Some(&outcome.session.id), None, &client())
        .await
        .unwrap();
    assert!(!gone.session.is_authenticated());

    let actions: Vec<ActivityAction> = gatehouse
        .recent_activity(&user.id, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(actions.len(), 3);
    for action in [
        ActivityAction::Register,
        ActivityAction::Login,
        ActivityAction::Logout,
    ] {
        assert!(actions.contains(&action));
    }
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let gatehouse = setup().await;
    register(&gatehouse, "dupe@example.com").await;

    let (mut session, csrf) = fresh_session(&gatehouse).await;
    let err = gatehouse
        .register(
            &mut session,
            &registration("DUPE@example.com"),
            Some(&csrf),
            &client(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::EmailAlreadyRegistered)));
}

#[tokio::test]
async fn test_login_lockout_after_repeated_failures() {
    let gatehouse = GatehouseBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .unwrap()
        .with_password(PasswordConfig::low_cost())
        .with_login_throttle(LoginThrottleConfig::default().with_max_failed_attempts(3))
        .apply_migrations(true)
        .build()
        .await
        .unwrap();
    register(&gatehouse, "locked@example.com").await;

    let (session, csrf) = fresh_session(&gatehouse).await;
    let wrong = login_request("locked@example.com", "Wrong1234", false);
    for _ in 0..3 {
        let err = gatehouse
            .login(&session, &wrong, Some(&csrf), &client())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
    }

    // Correct password is refused while the lockout lasts.
    let right = login_request("locked@example.com", PASSWORD, false);
    let err = gatehouse
        .login(&session, &right, Some(&csrf), &client())
        .await
        .unwrap_err();
    let retry_after = err.retry_after_secs().expect("lockout carries a retry time");
    assert!(retry_after > 0 && retry_after <= 900);
}

#[tokio::test]
async fn test_login_requires_matching_csrf_token() {
    let gatehouse = setup().await;
    register(&gatehouse, "csrf@example.com").await;
    let (session, _csrf) = fresh_session(&gatehouse).await;

    for token in [None, Some("forged")] {
        let err = gatehouse
            .login(
                &session,
                &login_request("csrf@example.com", PASSWORD, false),
                token,
                &client(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::SecurityTokenInvalid)));
    }
}

#[tokio::test]
async fn test_remember_me_restores_session() {
    let gatehouse = setup().await;
    register(&gatehouse, "remember@example.com").await;
    let (session, csrf) = fresh_session(&gatehouse).await;

    let outcome = gatehouse
        .login(
            &session,
            &login_request("remember@example.com", PASSWORD, true),
            Some(&csrf),
            &client(),
        )
        .await
        .unwrap();
    let handle = outcome.remember_me.expect("remember-me token issued");

    // Browser restarted: no session cookie, only the remember-me cookie.
    let restored = gatehouse
        .resume(None, Some(&handle.value), &client())
        .await
        .unwrap();
    assert!(restored.restored_from_remember_me);
    assert!(!restored.clear_remember_cookie);
    assert_eq!(restored.session.user_id, outcome.session.user_id);

    // Logging out revokes the token.
    gatehouse
        .logout(restored.session, Some(&handle.value), &client())
        .await
        .unwrap();
    let after = gatehouse
        .resume(None, Some(&handle.value), &client())
        .await
        .unwrap();
    assert!(!after.restored_from_remember_me);
    assert!(after.clear_remember_cookie);
    assert!(!after.session.is_authenticated());
}

#[tokio::test]
async fn test_deactivation_ends_sessions_and_blocks_login() {
    let gatehouse = setup().await;
    register(&gatehouse, "inactive@example.com").await;
    let (session, csrf) = fresh_session(&gatehouse).await;
    let outcome = gatehouse
        .login(
            &session,
            &login_request("inactive@example.com", PASSWORD, true),
            Some(&csrf),
            &client(),
        )
        .await
        .unwrap();
    let user_id = outcome.user.id.clone();
    let token = outcome.remember_me.unwrap().value;

    gatehouse.deactivate_user(&user_id).await.unwrap();

    let resumed = gatehouse
        .resume(Some(&outcome.session.id), Some(&token), &client())
        .await
        .unwrap();
    assert!(!resumed.session.is_authenticated());
    assert!(resumed.clear_remember_cookie);

    let (session, csrf) = fresh_session(&gatehouse).await;
    let err = gatehouse
        .login(
            &session,
            &login_request("inactive@example.com", PASSWORD, false),
            Some(&csrf),
            &client(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::AccountDisabled)));
}

#[tokio::test]
async fn test_cleanup_on_fresh_database_is_empty() {
    let gatehouse = setup().await;
    let (_session, _csrf) = fresh_session(&gatehouse).await;

    let report = gatehouse.cleanup().await.unwrap();
    assert_eq!(report.sessions, 0);
    assert_eq!(report.remember_tokens, 0);
}

#[tokio::test]
async fn test_idle_session_expires_with_notice() {
    let gatehouse = GatehouseBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .unwrap()
        .with_password(PasswordConfig::low_cost())
        .with_session_timeout(Duration::seconds(60))
        .apply_migrations(true)
        .build()
        .await
        .unwrap();
    register(&gatehouse, "idle@example.com").await;
    let (session, csrf) = fresh_session(&gatehouse).await;
    let outcome = gatehouse
        .login(
            &session,
            &login_request("idle@example.com", PASSWORD, false),
            Some(&csrf),
            &client(),
        )
        .await
        .unwrap();

    let mut stale = outcome.session.clone();
    stale.last_activity = stale.last_activity - Duration::minutes(5);
    gatehouse.save_session(&stale).await.unwrap();

    let resumed = gatehouse
        .resume(Some(&outcome.session.id), None, &client())
        .await
        .unwrap();
    assert!(!resumed.session.is_authenticated());
    assert_ne!(resumed.session.id.as_str(), outcome.session.id.as_str());
    assert_eq!(
        resumed.session.flash.as_ref().map(|f| f.kind),
        Some(FlashKind::Error)
    );
}
