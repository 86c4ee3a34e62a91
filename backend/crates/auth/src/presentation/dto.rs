//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entity::user::User;

// ============================================================================
// CSRF
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfResponse {
    /// Echo this in the `X-CSRF-Token` header on every state-changing request
    pub csrf_token: String,
}

// ============================================================================
// Sign In
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    /// True if a TOTP code must be posted to `/mfa` next
    pub mfa_required: bool,
    pub user: Option<UserResponse>,
}

/// Body of `/mfa`, `/totp/confirm`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpCodeRequest {
    pub code: String,
}

// ============================================================================
// TOTP Setup
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpSetupResponse {
    /// Base32, for manual entry
    pub secret: String,
    pub otpauth_url: String,
    /// `data:image/png;base64,...`
    pub qr_code: String,
}

// ============================================================================
// Current User
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id.to_string(),
            email: user.email.to_string(),
            display_name: user.display_name.clone(),
            is_admin: user.is_admin,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub totp_enabled: bool,
}

// ============================================================================
// User Administration
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}
