use axum_extra::extract::cookie::{Cookie, SameSite};
use gatehouse::{AccountType, ClientFingerprint, FlashMessage};
use serde::{Deserialize, Serialize};
use time::Duration;

#[derive(Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    /// Checkbox semantics: present means checked, whatever the value.
    #[serde(default)]
    pub remember_me: Option<String>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("remember_me", &self.remember_me.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Deserialize)]
pub struct RegisterForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

impl std::fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterForm")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("account_type", &self.account_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectQuery {
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CsrfResponse {
    pub csrf_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub flash: Option<FlashMessage>,
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl From<ConnectionInfo> for ClientFingerprint {
    fn from(info: ConnectionInfo) -> Self {
        ClientFingerprint::new(info.ip, info.user_agent)
    }
}

/// Names and attributes of the session and remember-me cookies.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub session_name: String,
    pub remember_name: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: CookieSameSite,
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            session_name: "gatehouse_session".to_string(),
            remember_name: "remember_token".to_string(),
            http_only: true,
            secure: true,
            same_site: CookieSameSite::Strict,
            path: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub enum CookieSameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl From<CookieSameSite> for SameSite {
    fn from(value: CookieSameSite) -> Self {
        match value {
            CookieSameSite::Strict => SameSite::Strict,
            CookieSameSite::Lax => SameSite::Lax,
            CookieSameSite::None => SameSite::None,
        }
    }
}

impl CookieConfig {
    /// Same as the default but without the `Secure` attribute, for plain-HTTP local setups.
    pub fn development() -> Self {
        Self {
            secure: false,
            ..Self::default()
        }
    }

    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = name.into();
        self
    }

    pub fn with_remember_name(mut self, name: impl Into<String>) -> Self {
        self.remember_name = name.into();
        self
    }

    pub fn session_cookie(&self, value: &str) -> String {
        self.build(&self.session_name, value).to_string()
    }

    /// Remember-me cookie that outlives the browser session.
    pub fn remember_cookie(&self, value: &str, max_age_secs: i64) -> String {
        let mut cookie = self.build(&self.remember_name, value);
        cookie.set_max_age(Duration::seconds(max_age_secs.max(0)));
        cookie.to_string()
    }

    /// Expire the named cookie immediately.
    pub fn removal_cookie(&self, name: &str) -> String {
        let mut cookie = self.build(name, "");
        cookie.set_max_age(Duration::ZERO);
        cookie.to_string()
    }

    fn build<'c>(&self, name: &str, value: &str) -> Cookie<'c> {
        Cookie::build((name.to_string(), value.to_string()))
            .path(self.path.clone())
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(self.same_site.into())
            .build()
    }
}
