use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use gatehouse::{ClientFingerprint, FlashMessage, Gatehouse, LOGIN_REQUIRED_MESSAGE, SessionId};
use gatehouse_core::RepositoryProvider;

use crate::{
    error::AuthError,
    extractors::CurrentSession,
    types::{ConnectionInfo, CookieConfig},
};

/// Shared state for the gatehouse routes and middleware.
pub struct AuthState<R: RepositoryProvider> {
    pub gatehouse: Gatehouse<R>,
    pub cookies: CookieConfig,
    /// Where [`require_login`] sends anonymous visitors.
    pub login_path: String,
}

impl<R: RepositoryProvider> Clone for AuthState<R> {
    fn clone(&self) -> Self {
        Self {
            gatehouse: self.gatehouse.clone(),
            cookies: self.cookies.clone(),
            login_path: self.login_path.clone(),
        }
    }
}

impl<R: RepositoryProvider> AuthState<R> {
    pub fn new(gatehouse: Gatehouse<R>) -> Self {
        Self {
            gatehouse,
            cookies: CookieConfig::default(),
            login_path: "/login".to_string(),
        }
    }

    pub fn with_cookie_config(mut self, cookies: CookieConfig) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }
}

/// Resolve the request's session before any handler runs.
///
/// Loads the session named by the session cookie (or starts a new one),
/// upgrades it from the remember-me cookie when possible, and makes it
/// available through [`CurrentSession`]. The response gets a new session
/// cookie when the identifier changed and loses a dead remember-me cookie,
/// unless the handler already set those cookies itself.
pub async fn session_layer<R>(
    State(state): State<AuthState<R>>,
    jar: CookieJar,
    connection: ConnectionInfo,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    R: RepositoryProvider,
{
    if request.extensions().get::<CurrentSession>().is_some() {
        return Ok(next.run(request).await);
    }

    let presented = jar
        .get(&state.cookies.session_name)
        .map(|cookie| SessionId::new(cookie.value()));
    let remember_token = jar
        .get(&state.cookies.remember_name)
        .map(|cookie| cookie.value().to_string());

    let outcome = state
        .gatehouse
        .resume(
            presented.as_ref(),
            remember_token.as_deref(),
            &ClientFingerprint::from(connection),
        )
        .await?;

    let session_changed =
        presented.as_ref().map(SessionId::as_str) != Some(outcome.session.id.as_str());
    let session_id = outcome.session.id.clone();
    request
        .extensions_mut()
        .insert(CurrentSession(outcome.session));

    let mut response = next.run(request).await;

    if session_changed && !sets_cookie(&response, &state.cookies.session_name) {
        append_cookie(
            &mut response,
            &state.cookies.session_cookie(session_id.as_str()),
        );
    }
    if outcome.clear_remember_cookie && !sets_cookie(&response, &state.cookies.remember_name) {
        append_cookie(
            &mut response,
            &state.cookies.removal_cookie(&state.cookies.remember_name),
        );
    }

    Ok(response)
}

/// Redirect anonymous requests to the login page.
///
/// The original path travels in the `redirect` query parameter and the
/// session gets a "Please login to continue" flash. Must run inside
/// [`session_layer`].
pub async fn require_login<R>(
    State(state): State<AuthState<R>>,
    CurrentSession(mut session): CurrentSession,
    request: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    R: RepositoryProvider,
{
    if session.is_authenticated() {
        return Ok(next.run(request).await);
    }

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    session.set_flash(FlashMessage::warning(LOGIN_REQUIRED_MESSAGE));
    state.gatehouse.save_session(&session).await?;

    tracing::debug!(path = request.uri().path(), "Anonymous request redirected to login");
    let location = format!(
        "{}?redirect={}",
        state.login_path,
        urlencoding::encode(target)
    );
    Ok(Redirect::to(&location).into_response())
}

pub(crate) fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| {
            value
                .split_once('=')
                .is_some_and(|(cookie_name, _)| cookie_name.trim() == name)
        })
}

pub(crate) fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "Dropping unrepresentable Set-Cookie header"),
    }
}
