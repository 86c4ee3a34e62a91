//! Pending Challenge Entity
//!
//! Short-lived, single-use record bridging two steps of a flow:
//! - `SignIn`: the password matched, a TOTP code is still owed
//! - `TotpEnrollment`: a freshly generated secret awaiting its first code
//!
//! Keyed by the digest of its own opaque token. Consumed atomically on
//! success and burned after too many wrong codes.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{
    session_token::TokenDigest, totp_secret::TotpSecret, user_id::UserId,
};

/// The wrong code that deletes the challenge; the fifth miss burns it
pub const MAX_FAILED_ATTEMPTS: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengePurpose {
    SignIn,
    TotpEnrollment,
}

impl ChallengePurpose {
    pub fn code(&self) -> &'static str {
        match self {
            ChallengePurpose::SignIn => "sign_in",
            ChallengePurpose::TotpEnrollment => "totp_enrollment",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "sign_in" => Some(ChallengePurpose::SignIn),
            "totp_enrollment" => Some(ChallengePurpose::TotpEnrollment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingChallenge {
    pub token_digest: TokenDigest,
    pub user_id: UserId,
    pub purpose: ChallengePurpose,
    /// Present for enrollments only
    pub totp_secret: Option<TotpSecret>,
    pub failed_attempts: u16,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingChallenge {
    pub fn sign_in(
        token_digest: TokenDigest,
        user_id: UserId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            token_digest,
            user_id,
            purpose: ChallengePurpose::SignIn,
            totp_secret: None,
            failed_attempts: 0,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn totp_enrollment(
        token_digest: TokenDigest,
        user_id: UserId,
        secret: TotpSecret,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            token_digest,
            user_id,
            purpose: ChallengePurpose::TotpEnrollment,
            totp_secret: Some(secret),
            failed_attempts: 0,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
