//! Repository Traits
//!
//! Storage interfaces. Every method is atomic on its own; the use cases never
//! hold a transaction across calls.
//!
//! Method names are unique across traits so one type can implement all of
//! them without call-site ambiguity.

use chrono::{DateTime, Utc};

use crate::domain::entity::{
    activity_entry::ActivityEntry, auth_session::AuthSession, credential::Credential,
    pending_challenge::{ChallengePurpose, PendingChallenge},
    user::User,
};
use crate::domain::value_object::{email::Email, session_token::TokenDigest, user_id::UserId};
use crate::error::AuthResult;

#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Store a new user together with its credential. Either both rows land
    /// or neither does. Fails with `EmailTaken` when the email is registered.
    async fn insert_user_with_credential(
        &self,
        user: &User,
        credential: &Credential,
    ) -> AuthResult<()>;

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    async fn update_user(&self, user: &User) -> AuthResult<()>;
}

#[trait_variant::make(CredentialRepository: Send)]
pub trait LocalCredentialRepository {
    async fn insert_credential(&self, credential: &Credential) -> AuthResult<()>;

    async fn find_credential(&self, user_id: &UserId) -> AuthResult<Option<Credential>>;

    async fn update_credential(&self, credential: &Credential) -> AuthResult<()>;
}

#[trait_variant::make(AuthSessionRepository: Send)]
pub trait LocalAuthSessionRepository {
    async fn insert_session(&self, session: &AuthSession) -> AuthResult<()>;

    async fn find_session(&self, digest: &TokenDigest) -> AuthResult<Option<AuthSession>>;

    /// Set `last_seen_at`. A vanished row is not an error.
    async fn touch_session(&self, digest: &TokenDigest, now: DateTime<Utc>) -> AuthResult<()>;

    /// Idempotent
    async fn delete_session(&self, digest: &TokenDigest) -> AuthResult<()>;

    async fn delete_sessions_for_user(&self, user_id: &UserId) -> AuthResult<u64>;

    /// Remove every session with `expires_at < now`
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

#[trait_variant::make(PendingChallengeRepository: Send)]
pub trait LocalPendingChallengeRepository {
    async fn insert_challenge(&self, challenge: &PendingChallenge) -> AuthResult<()>;

    async fn find_challenge(&self, digest: &TokenDigest) -> AuthResult<Option<PendingChallenge>>;

    /// The user's current enrollment, if any
    async fn find_enrollment_for_user(
        &self,
        user_id: &UserId,
    ) -> AuthResult<Option<PendingChallenge>>;

    /// Increment the failure counter; returns the new count, or `None` if the
    /// challenge is gone.
    async fn record_challenge_failure(&self, digest: &TokenDigest) -> AuthResult<Option<u16>>;

    /// Delete and return the challenge. Of two concurrent callers only one
    /// gets `Some`.
    async fn consume_challenge(&self, digest: &TokenDigest)
    -> AuthResult<Option<PendingChallenge>>;

    async fn delete_challenges_for_user(
        &self,
        user_id: &UserId,
        purpose: ChallengePurpose,
    ) -> AuthResult<u64>;

    async fn delete_expired_challenges(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

#[trait_variant::make(ActivityLogRepository: Send)]
pub trait LocalActivityLogRepository {
    async fn append_activity(&self, entry: &ActivityEntry) -> AuthResult<()>;
}
