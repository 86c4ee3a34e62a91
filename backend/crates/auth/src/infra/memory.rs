//! In-memory Repository
//!
//! Backs the test suite and local experiments. Each method takes the lock
//! once, so every operation is atomic just like its SQL counterpart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::domain::entity::{
    activity_entry::ActivityEntry,
    auth_session::AuthSession,
    credential::Credential,
    pending_challenge::{ChallengePurpose, PendingChallenge},
    user::User,
};
use crate::domain::repository::{
    ActivityLogRepository, AuthSessionRepository, CredentialRepository,
    PendingChallengeRepository, UserRepository,
};
use crate::domain::value_object::{email::Email, session_token::TokenDigest, user_id::UserId};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    credentials: HashMap<UserId, Credential>,
    sessions: HashMap<TokenDigest, AuthSession>,
    challenges: HashMap<TokenDigest, PendingChallenge>,
    activity: Vec<ActivityEntry>,
    fail_activity_writes: bool,
    fail_credential_writes: bool,
}

#[derive(Clone, Default)]
pub struct InMemoryAuthRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn sessions(&self) -> Vec<AuthSession> {
        self.state().sessions.values().cloned().collect()
    }

    pub fn challenges(&self) -> Vec<PendingChallenge> {
        self.state().challenges.values().cloned().collect()
    }

    pub fn activity(&self) -> Vec<ActivityEntry> {
        self.state().activity.clone()
    }

    /// Make `append_activity` fail, to exercise the audit failure path
    pub fn fail_activity_writes(&self, fail: bool) {
        self.state().fail_activity_writes = fail;
    }

    /// Make every credential write fail, like a broken `user_credentials` table
    pub fn fail_credential_writes(&self, fail: bool) {
        self.state().fail_credential_writes = fail;
    }

    pub fn user_count(&self) -> usize {
        self.state().users.len()
    }
}

impl MemoryState {
    fn check_credential_write(&self) -> AuthResult<()> {
        if self.fail_credential_writes {
            return Err(AuthError::Internal("credential store unavailable".to_string()));
        }
        Ok(())
    }
}

impl UserRepository for InMemoryAuthRepository {
    async fn insert_user_with_credential(
        &self,
        user: &User,
        credential: &Credential,
    ) -> AuthResult<()> {
        let mut state = self.state();
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AuthError::EmailTaken);
        }
        state.check_credential_write()?;
        state.users.insert(user.user_id, user.clone());
        state.credentials.insert(credential.user_id, credential.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.state().users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> AuthResult<()> {
        if let Some(existing) = self.state().users.get_mut(&user.user_id) {
            *existing = user.clone();
        }
        Ok(())
    }
}

impl CredentialRepository for InMemoryAuthRepository {
    async fn insert_credential(&self, credential: &Credential) -> AuthResult<()> {
        let mut state = self.state();
        state.check_credential_write()?;
        state.credentials.insert(credential.user_id, credential.clone());
        Ok(())
    }

    async fn find_credential(&self, user_id: &UserId) -> AuthResult<Option<Credential>> {
        Ok(self.state().credentials.get(user_id).cloned())
    }

    async fn update_credential(&self, credential: &Credential) -> AuthResult<()> {
        let mut state = self.state();
        state.check_credential_write()?;
        if let Some(existing) = state.credentials.get_mut(&credential.user_id) {
            *existing = credential.clone();
        }
        Ok(())
    }
}

impl AuthSessionRepository for InMemoryAuthRepository {
    async fn insert_session(&self, session: &AuthSession) -> AuthResult<()> {
        self.state()
            .sessions
            .insert(session.token_digest, session.clone());
        Ok(())
    }

    async fn find_session(&self, digest: &TokenDigest) -> AuthResult<Option<AuthSession>> {
        Ok(self.state().sessions.get(digest).cloned())
    }

    async fn touch_session(&self, digest: &TokenDigest, now: DateTime<Utc>) -> AuthResult<()> {
        if let Some(session) = self.state().sessions.get_mut(digest) {
            session.touch(now);
        }
        Ok(())
    }

    async fn delete_session(&self, digest: &TokenDigest) -> AuthResult<()> {
        self.state().sessions.remove(digest);
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let mut state = self.state();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| &s.user_id != user_id);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - state.sessions.len()) as u64)
    }
}

impl PendingChallengeRepository for InMemoryAuthRepository {
    async fn insert_challenge(&self, challenge: &PendingChallenge) -> AuthResult<()> {
        self.state()
            .challenges
            .insert(challenge.token_digest, challenge.clone());
        Ok(())
    }

    async fn find_challenge(&self, digest: &TokenDigest) -> AuthResult<Option<PendingChallenge>> {
        Ok(self.state().challenges.get(digest).cloned())
    }

    async fn find_enrollment_for_user(
        &self,
        user_id: &UserId,
    ) -> AuthResult<Option<PendingChallenge>> {
        Ok(self
            .state()
            .challenges
            .values()
            .filter(|c| &c.user_id == user_id && c.purpose == ChallengePurpose::TotpEnrollment)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn record_challenge_failure(&self, digest: &TokenDigest) -> AuthResult<Option<u16>> {
        Ok(self.state().challenges.get_mut(digest).map(|c| {
            c.failed_attempts = c.failed_attempts.saturating_add(1);
            c.failed_attempts
        }))
    }

    async fn consume_challenge(
        &self,
        digest: &TokenDigest,
    ) -> AuthResult<Option<PendingChallenge>> {
        Ok(self.state().challenges.remove(digest))
    }

    async fn delete_challenges_for_user(
        &self,
        user_id: &UserId,
        purpose: ChallengePurpose,
    ) -> AuthResult<u64> {
        let mut state = self.state();
        let before = state.challenges.len();
        state
            .challenges
            .retain(|_, c| !(&c.user_id == user_id && c.purpose == purpose));
        Ok((before - state.challenges.len()) as u64)
    }

    async fn delete_expired_challenges(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state();
        let before = state.challenges.len();
        state.challenges.retain(|_, c| !c.is_expired_at(now));
        Ok((before - state.challenges.len()) as u64)
    }
}

impl ActivityLogRepository for InMemoryAuthRepository {
    async fn append_activity(&self, entry: &ActivityEntry) -> AuthResult<()> {
        let mut state = self.state();
        if state.fail_activity_writes {
            return Err(AuthError::Internal("activity log unavailable".to_string()));
        }
        state.activity.push(entry.clone());
        Ok(())
    }
}
