//! Auth Error Types
//!
//! Auth-specific variants that render through the unified
//! `kernel::error::AppError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email, wrong password or inactive account. Never more specific.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Missing, expired or revoked session (or pending challenge)
    #[error("Not authenticated")]
    Unauthenticated,

    /// Valid session, insufficient privilege
    #[error("Forbidden")]
    Forbidden,

    /// Password accepted, second factor still outstanding
    #[error("Two-factor authentication required")]
    MfaRequired,

    #[error("Invalid two-factor authentication code")]
    InvalidMfaCode,

    /// Too many wrong codes against one pending challenge
    #[error("Too many invalid codes, sign in again")]
    MfaAttemptsExceeded,

    #[error("Two-factor authentication is not set up")]
    TotpNotEnrolled,

    #[error("Bad CSRF token")]
    CsrfMismatch,

    #[error("Password validation failed: {0}")]
    PasswordPolicy(String),

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated
            | AuthError::InvalidMfaCode
            | AuthError::MfaAttemptsExceeded => ErrorKind::Unauthorized,
            AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::MfaRequired | AuthError::TotpNotEnrolled => ErrorKind::UnprocessableEntity,
            AuthError::CsrfMismatch | AuthError::PasswordPolicy(_) | AuthError::InvalidInput(_) => {
                ErrorKind::BadRequest
            }
            AuthError::EmailTaken => ErrorKind::Conflict,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Store and internal failures are hidden behind a generic message.
    pub fn to_app_error(&self) -> AppError {
        match self {
            AuthError::Database(_) | AuthError::Internal(_) => {
                AppError::internal("Something went wrong").with_action("Please try again later")
            }
            AuthError::CsrfMismatch => AppError::new(self.kind(), self.to_string())
                .with_action("Reload the page and try again"),
            _ => AppError::new(self.kind(), self.to_string()),
        }
    }

    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::InvalidMfaCode | AuthError::MfaAttemptsExceeded => {
                tracing::warn!(error = %self, "Second factor rejected");
            }
            AuthError::CsrfMismatch => {
                tracing::warn!("CSRF token mismatch");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Internal(format!("Blocking task failed: {err}"))
    }
}
