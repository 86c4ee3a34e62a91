//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use platform::clock::Clock;
use platform::cookie::{extract_cookie, set_cookie_header};
use platform::csrf::generate_csrf_token;

use crate::application::config::AuthConfig;
use crate::application::{
    CheckSessionUseCase, CreateUserInput, SignInInput, SignInOutcome, SignInUseCase,
    SignOutUseCase, SignedIn, TotpSetupUseCase, UserAdminUseCase,
};
use crate::domain::repository::{
    ActivityLogRepository, AuthSessionRepository, CredentialRepository,
    PendingChallengeRepository, UserRepository,
};
use crate::domain::value_object::user_id::UserId;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    CreateUserRequest, CsrfResponse, MeResponse, SetActiveRequest, SetAdminRequest,
    SetPasswordRequest, SignInRequest, SignInResponse, TotpCodeRequest, TotpSetupResponse,
    UserResponse,
};
use crate::presentation::middleware::CurrentUser;

/// Everything a handler needs from storage
pub trait AuthStore:
    UserRepository
    + CredentialRepository
    + AuthSessionRepository
    + PendingChallengeRepository
    + ActivityLogRepository
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> AuthStore for T where
    T: UserRepository
        + CredentialRepository
        + AuthSessionRepository
        + PendingChallengeRepository
        + ActivityLogRepository
        + Clone
        + Send
        + Sync
        + 'static
{
}

/// Shared state for auth handlers
#[derive(Clone)]
pub struct AuthAppState<R>
where
    R: AuthStore,
{
    pub repo: Arc<R>,
    pub config: Arc<AuthConfig>,
    pub clock: Arc<dyn Clock>,
}

impl<R> AuthAppState<R>
where
    R: AuthStore,
{
    pub fn new(repo: R, config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo: Arc::new(repo),
            config: Arc::new(config),
            clock,
        }
    }

    pub fn check_session(&self) -> CheckSessionUseCase<R, R> {
        CheckSessionUseCase::new(
            self.repo.clone(),
            self.repo.clone(),
            self.config.clone(),
            self.clock.clone(),
        )
    }

    pub fn sign_in(&self) -> SignInUseCase<R, R, R, R, R> {
        SignInUseCase::new(
            self.repo.clone(),
            self.repo.clone(),
            self.repo.clone(),
            self.repo.clone(),
            self.repo.clone(),
            self.config.clone(),
            self.clock.clone(),
        )
    }

    pub fn sign_out(&self) -> SignOutUseCase<R, R> {
        SignOutUseCase::new(
            self.repo.clone(),
            self.repo.clone(),
            self.config.clone(),
            self.clock.clone(),
        )
    }

    pub fn totp_setup(&self) -> TotpSetupUseCase<R, R, R> {
        TotpSetupUseCase::new(
            self.repo.clone(),
            self.repo.clone(),
            self.repo.clone(),
            self.config.clone(),
            self.clock.clone(),
        )
    }

    pub fn user_admin(&self) -> UserAdminUseCase<R, R, R, R> {
        UserAdminUseCase::new(
            self.repo.clone(),
            self.repo.clone(),
            self.repo.clone(),
            self.repo.clone(),
            self.config.clone(),
            self.clock.clone(),
        )
    }
}

// ============================================================================
// CSRF
// ============================================================================

/// GET /api/auth/csrf
///
/// Returns the caller's CSRF token, minting one (and its cookie) if needed.
pub async fn csrf_token<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
) -> Response
where
    R: AuthStore,
{
    if let Some(token) = extract_cookie(&headers, &state.config.csrf_cookie_name) {
        return Json(CsrfResponse { csrf_token: token }).into_response();
    }

    let token = generate_csrf_token();
    let cookie = state.config.csrf_cookie().build_set_cookie(&token);

    (
        [(header::SET_COOKIE, set_cookie_header(&cookie))],
        Json(CsrfResponse { csrf_token: token }),
    )
        .into_response()
}

// ============================================================================
// Sign In
// ============================================================================

/// POST /api/auth/signin
pub async fn sign_in<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<SignInRequest>,
) -> AuthResult<Response>
where
    R: AuthStore,
{
    let outcome = state
        .sign_in()
        .execute(SignInInput {
            email: req.email,
            password: req.password,
        })
        .await?;

    match outcome {
        SignInOutcome::SignedIn(signed_in) => Ok(signed_in_response(&state.config, signed_in)),
        SignInOutcome::MfaRequired { pending_token } => {
            let cookie = state.config.mfa_cookie().build_set_cookie(pending_token.as_str());
            Ok((
                [(header::SET_COOKIE, set_cookie_header(&cookie))],
                Json(SignInResponse {
                    mfa_required: true,
                    user: None,
                }),
            )
                .into_response())
        }
    }
}

/// POST /api/auth/mfa
pub async fn mfa<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
    Json(req): Json<TotpCodeRequest>,
) -> AuthResult<Response>
where
    R: AuthStore,
{
    let pending_token = extract_cookie(&headers, &state.config.mfa_cookie_name)
        .ok_or(AuthError::Unauthenticated)?;

    let signed_in = state.sign_in().complete_mfa(&pending_token, &req.code).await?;

    Ok(signed_in_response(&state.config, signed_in))
}

// ============================================================================
// Sign Out
// ============================================================================

/// POST /api/auth/signout
///
/// Always clears the cookie, even when the session was already gone.
pub async fn sign_out<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
) -> AuthResult<impl IntoResponse>
where
    R: AuthStore,
{
    if let Some(token) = extract_cookie(&headers, &state.config.session_cookie_name) {
        let actor = state.check_session().resolve(&token).await.ok();
        state
            .sign_out()
            .execute(&token, actor.as_ref().map(|current| &current.user))
            .await?;
    }

    let cookie = state.config.session_cookie().build_delete_cookie();

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, set_cookie_header(&cookie))],
    ))
}

// ============================================================================
// Current User (requires session)
// ============================================================================

/// GET /api/auth/me
pub async fn me<R>(
    State(state): State<AuthAppState<R>>,
    current: CurrentUser,
) -> AuthResult<Json<MeResponse>>
where
    R: AuthStore,
{
    let totp_enabled = state
        .repo
        .find_credential(&current.user.user_id)
        .await?
        .is_some_and(|c| c.requires_totp());

    Ok(Json(MeResponse {
        user: UserResponse::from(&current.user),
        totp_enabled,
    }))
}

// ============================================================================
// TOTP Setup (requires session)
// ============================================================================

/// POST /api/auth/totp/start
pub async fn totp_start<R>(
    State(state): State<AuthAppState<R>>,
    current: CurrentUser,
) -> AuthResult<Json<TotpSetupResponse>>
where
    R: AuthStore,
{
    let enrollment = state.totp_setup().start(&current.user).await?;

    Ok(Json(TotpSetupResponse {
        secret: enrollment.secret.as_base32().to_string(),
        otpauth_url: enrollment.otpauth_url,
        qr_code: format!("data:image/png;base64,{}", enrollment.qr_code_base64),
    }))
}

/// POST /api/auth/totp/confirm
pub async fn totp_confirm<R>(
    State(state): State<AuthAppState<R>>,
    current: CurrentUser,
    Json(req): Json<TotpCodeRequest>,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
{
    if state.totp_setup().confirm(&current.user, &req.code).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AuthError::InvalidMfaCode)
    }
}

/// POST /api/auth/totp/disable
pub async fn totp_disable<R>(
    State(state): State<AuthAppState<R>>,
    current: CurrentUser,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
{
    state.totp_setup().disable(&current.user).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// User Administration (requires admin session)
// ============================================================================

/// POST /api/admin/users
pub async fn create_user<R>(
    State(state): State<AuthAppState<R>>,
    current: CurrentUser,
    Json(req): Json<CreateUserRequest>,
) -> AuthResult<(StatusCode, Json<UserResponse>)>
where
    R: AuthStore,
{
    let user = state
        .user_admin()
        .create_user(
            CreateUserInput {
                email: req.email,
                display_name: req.display_name,
                password: req.password,
                is_admin: req.is_admin,
            },
            Some(&current.user),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// POST /api/admin/users/{id}/password
pub async fn set_user_password<R>(
    State(state): State<AuthAppState<R>>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    Json(req): Json<SetPasswordRequest>,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
{
    let user_id = parse_user_id(&user_id)?;
    state
        .user_admin()
        .set_password(&user_id, req.password, Some(&current.user))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/users/{id}/admin
pub async fn set_user_admin<R>(
    State(state): State<AuthAppState<R>>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    Json(req): Json<SetAdminRequest>,
) -> AuthResult<Json<UserResponse>>
where
    R: AuthStore,
{
    let user_id = parse_user_id(&user_id)?;
    let user = state
        .user_admin()
        .set_admin(&user_id, req.is_admin, Some(&current.user))
        .await?;
    Ok(Json(UserResponse::from(&user)))
}

/// POST /api/admin/users/{id}/active
pub async fn set_user_active<R>(
    State(state): State<AuthAppState<R>>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> AuthResult<Json<UserResponse>>
where
    R: AuthStore,
{
    let user_id = parse_user_id(&user_id)?;
    let user = state
        .user_admin()
        .set_active(&user_id, req.is_active, Some(&current.user))
        .await?;
    Ok(Json(UserResponse::from(&user)))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_user_id(raw: &str) -> AuthResult<UserId> {
    raw.parse()
        .map_err(|_| AuthError::InvalidInput("invalid user id".to_string()))
}

/// Session cookie set, pending-MFA cookie cleared
fn signed_in_response(config: &AuthConfig, signed_in: SignedIn) -> Response {
    let session_cookie = config
        .session_cookie()
        .build_set_cookie(signed_in.session.token.as_str());
    let clear_mfa = config.mfa_cookie().build_delete_cookie();

    let cookies: [(header::HeaderName, HeaderValue); 2] = [
        (header::SET_COOKIE, set_cookie_header(&session_cookie)),
        (header::SET_COOKIE, set_cookie_header(&clear_mfa)),
    ];

    (
        AppendHeaders(cookies),
        Json(SignInResponse {
            mfa_required: false,
            user: Some(UserResponse::from(&signed_in.user)),
        }),
    )
        .into_response()
}
