//! Auth Middleware
//!
//! Layers for protected routes. `require_session` resolves the session
//! cookie and stores a [`CurrentUser`] in the request extensions; handlers
//! pick it up with the `CurrentUser` extractor.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::Response;
use platform::cookie::extract_cookie;
use platform::csrf::{CSRF_HEADER, csrf_matches};

use crate::application::config::AuthConfig;
use crate::domain::entity::user::User;
use crate::error::{AuthError, AuthResult};
use crate::presentation::handlers::{AuthAppState, AuthStore};

/// The signed-in user of this request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
}

impl CurrentUser {
    pub fn require_admin(&self) -> AuthResult<&User> {
        if self.user.is_admin {
            Ok(&self.user)
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Reject the request unless it carries a live session
pub async fn require_session<R>(
    State(state): State<AuthAppState<R>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError>
where
    R: AuthStore,
{
    let token = extract_cookie(req.headers(), &state.config.session_cookie_name)
        .ok_or(AuthError::Unauthenticated)?;

    let current = state.check_session().resolve(&token).await?;

    req.extensions_mut().insert(CurrentUser { user: current.user });

    Ok(next.run(req).await)
}

/// Must run inside `require_session`
pub async fn require_admin(req: Request<Body>, next: Next) -> Result<Response, AuthError> {
    let current = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AuthError::Unauthenticated)?;
    current.require_admin()?;

    Ok(next.run(req).await)
}

/// Double-submit check for every state-changing method
pub async fn require_csrf(
    State(config): State<Arc<AuthConfig>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    if is_safe_method(req.method()) {
        return Ok(next.run(req).await);
    }

    let cookie = extract_cookie(req.headers(), &config.csrf_cookie_name);
    let header = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok());

    if !csrf_matches(cookie.as_deref(), header) {
        tracing::debug!(method = %req.method(), path = %req.uri().path(), "CSRF check failed");
        return Err(AuthError::CsrfMismatch);
    }

    Ok(next.run(req).await)
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
