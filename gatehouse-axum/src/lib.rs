//! # Gatehouse Axum Integration
//!
//! Axum routes, extractors and middleware for gatehouse sessions, login,
//! logout and registration.
//!
//! ## Routes
//!
//! | Route       | Method | Behaviour                                          |
//! | ----------- | ------ | -------------------------------------------------- |
//! | `/health`   | GET    | storage health                                     |
//! | `/csrf`     | GET    | the session's CSRF token                           |
//! | `/session`  | GET    | `{ authenticated, user_id, flash }`, consumes flash |
//! | `/login`    | POST   | form login, 303 to `?redirect=` or `/dashboard`    |
//! | `/logout`   | POST   | CSRF-checked logout, 303 to `/`                    |
//! | `/register` | POST   | form registration, 303 to the login page           |
//!
//! Forms carry the CSRF token in a `csrf_token` field; script clients may send
//! it in the `X-CSRF-Token` header instead.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use gatehouse::{GatehouseBuilder, SqliteRepositoryProvider};
//! use gatehouse_axum::{AuthState, AuthUser, CookieConfig, require_login, session_layer};
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
//!     let state = AuthState::new(gatehouse).with_cookie_config(CookieConfig::development());
//!
//!     let app = Router::new()
//!         .route("/dashboard", get(dashboard))
//!         .route_layer(from_fn_with_state(
//!             state.clone(),
//!             require_login::<SqliteRepositoryProvider>,
//!         ))
//!         .layer(from_fn_with_state(
//!             state.clone(),
//!             session_layer::<SqliteRepositoryProvider>,
//!         ))
//!         .merge(gatehouse_axum::routes(state));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//!
//! async fn dashboard(AuthUser(user_id): AuthUser) -> String {
//!     format!("Hello, {user_id}")
//! }
//! ```

mod error;
mod extractors;
mod middleware;
mod routes;
mod types;

pub use error::{AuthError, Result};
pub use extractors::{AuthUser, CSRF_HEADER, CsrfHeader, CurrentSession};
pub use middleware::{AuthState, require_login, session_layer};
pub use routes::{DEFAULT_RETURN_PATH, create_router, safe_return_path};
pub use types::{
    ConnectionInfo, CookieConfig, CookieSameSite, CsrfResponse, HealthResponse, LoginForm,
    LogoutForm, RedirectQuery, RegisterForm, SessionResponse,
};

use axum::Router;
use gatehouse_core::RepositoryProvider;

/// Create the gatehouse routes. They resolve sessions themselves, so they can
/// be merged into an application router as they are.
pub fn routes<R>(state: AuthState<R>) -> Router
where
    R: RepositoryProvider + 'static,
{
    create_router(state)
}
