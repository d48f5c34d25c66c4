use axum::{
    Form, Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use gatehouse::{ClientFingerprint, LoginRequest, Registration};
use gatehouse_core::RepositoryProvider;

use crate::{
    error::{AuthError, Result},
    extractors::{CsrfHeader, CurrentSession},
    middleware::{AuthState, append_cookie, session_layer},
    types::*,
};

pub const DEFAULT_RETURN_PATH: &str = "/dashboard";

pub fn create_router<R>(state: AuthState<R>) -> Router
where
    R: RepositoryProvider + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/csrf", get(csrf_handler))
        .route("/session", get(session_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/register", post(register_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_layer::<R>,
        ))
        .with_state(state)
}

/// Only local absolute paths are followed after login.
pub fn safe_return_path(requested: Option<&str>) -> &str {
    match requested {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => DEFAULT_RETURN_PATH,
    }
}

async fn health_handler<R>(State(state): State<AuthState<R>>) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    state.gatehouse.health_check().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn csrf_handler<R>(
    State(state): State<AuthState<R>>,
    CurrentSession(mut session): CurrentSession,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let token = state.gatehouse.issue_csrf(&mut session).await?;

    Ok(Json(CsrfResponse {
        csrf_token: token.as_str().to_string(),
    }))
}

async fn session_handler<R>(
    State(state): State<AuthState<R>>,
    CurrentSession(mut session): CurrentSession,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let flash = session.take_flash();
    if flash.is_some() {
        state.gatehouse.save_session(&session).await?;
    }

    Ok(Json(SessionResponse {
        authenticated: session.is_authenticated(),
        user_id: session.user_id.as_ref().map(|id| id.as_str().to_string()),
        flash,
    }))
}

async fn login_handler<R>(
    State(state): State<AuthState<R>>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<RedirectQuery>,
    connection_info: ConnectionInfo,
    CsrfHeader(csrf_header): CsrfHeader,
    Form(form): Form<LoginForm>,
) -> Result<Response>
where
    R: RepositoryProvider,
{
    let request = LoginRequest {
        email: form.email,
        password: form.password,
        remember_me: form.remember_me.is_some(),
    };
    let csrf = form.csrf_token.or(csrf_header);

    let outcome = state
        .gatehouse
        .login(
            &session,
            &request,
            csrf.as_deref(),
            &ClientFingerprint::from(connection_info),
        )
        .await?;

    let mut response =
        Redirect::to(safe_return_path(query.redirect.as_deref())).into_response();
    append_cookie(
        &mut response,
        &state.cookies.session_cookie(outcome.session.id.as_str()),
    );
    if let Some(handle) = &outcome.remember_me {
        let max_age = state.gatehouse.config().remember_me.lifetime.num_seconds();
        append_cookie(
            &mut response,
            &state.cookies.remember_cookie(&handle.value, max_age),
        );
    }

    Ok(response)
}

async fn logout_handler<R>(
    State(state): State<AuthState<R>>,
    CurrentSession(session): CurrentSession,
    jar: CookieJar,
    connection_info: ConnectionInfo,
    CsrfHeader(csrf_header): CsrfHeader,
    Form(form): Form<LogoutForm>,
) -> Result<Response>
where
    R: RepositoryProvider,
{
    let csrf = form.csrf_token.or(csrf_header);
    if !state.gatehouse.verify_csrf(&session, csrf.as_deref()) {
        return Err(AuthError::SecurityTokenInvalid);
    }

    let remember_token = jar
        .get(&state.cookies.remember_name)
        .map(|cookie| cookie.value().to_string());
    let fresh = state
        .gatehouse
        .logout(
            session,
            remember_token.as_deref(),
            &ClientFingerprint::from(connection_info),
        )
        .await?;

    let mut response = Redirect::to("/").into_response();
    append_cookie(
        &mut response,
        &state.cookies.session_cookie(fresh.id.as_str()),
    );
    append_cookie(
        &mut response,
        &state.cookies.removal_cookie(&state.cookies.remember_name),
    );

    Ok(response)
}

async fn register_handler<R>(
    State(state): State<AuthState<R>>,
    CurrentSession(mut session): CurrentSession,
    connection_info: ConnectionInfo,
    CsrfHeader(csrf_header): CsrfHeader,
    Form(form): Form<RegisterForm>,
) -> Result<Response>
where
    R: RepositoryProvider,
{
    let csrf = form.csrf_token.or(csrf_header);
    let registration = Registration {
        full_name: form.full_name,
        email: form.email,
        phone: form.phone,
        password: form.password,
        confirm_password: form.confirm_password,
        account_type: form.account_type,
    };

    state
        .gatehouse
        .register(
            &mut session,
            &registration,
            csrf.as_deref(),
            &ClientFingerprint::from(connection_info),
        )
        .await?;

    Ok(Redirect::to(&state.login_path).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_return_path() {
        assert_eq!(safe_return_path(Some("/listings/42")), "/listings/42");
        assert_eq!(safe_return_path(None), DEFAULT_RETURN_PATH);
        assert_eq!(safe_return_path(Some("https://evil.example")), DEFAULT_RETURN_PATH);
        assert_eq!(safe_return_path(Some("//evil.example")), DEFAULT_RETURN_PATH);
        assert_eq!(safe_return_path(Some("/\\evil.example")), DEFAULT_RETURN_PATH);
        assert_eq!(safe_return_path(Some("")), DEFAULT_RETURN_PATH);
    }
}
