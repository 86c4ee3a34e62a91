//! Auth Session Entity
//!
//! A live sign-in. Keyed by the digest of the bearer token; the token itself
//! is returned to the client once and never stored.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{session_token::TokenDigest, user_id::UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token_digest: TokenDigest,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Touched on every authenticated request
    pub last_seen_at: DateTime<Utc>,
    /// Fixed at issue time. Activity never extends it.
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn new(token_digest: TokenDigest, user_id: UserId, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token_digest,
            user_id,
            created_at: now,
            last_seen_at: now,
            expires_at: now + ttl,
        }
    }

    /// Dead once `expires_at` is strictly in the past
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen_at = now;
    }
}
