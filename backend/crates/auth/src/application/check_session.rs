//! Check Session Use Case
//!
//! Resolves a bearer token to its user. Touch-on-read: `last_seen_at` moves,
//! `expires_at` never does. Every failure is the same `Unauthenticated`.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::domain::entity::{auth_session::AuthSession, user::User};
use crate::domain::repository::{AuthSessionRepository, UserRepository};
use crate::domain::value_object::session_token::SessionToken;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub user: User,
    pub session: AuthSession,
}

pub struct CheckSessionUseCase<U, S>
where
    U: UserRepository,
    S: AuthSessionRepository,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<U, S> CheckSessionUseCase<U, S>
where
    U: UserRepository,
    S: AuthSessionRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        session_repo: Arc<S>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            config,
            clock,
        }
    }

    pub async fn resolve(&self, token: &str) -> AuthResult<CurrentSession> {
        if token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        let digest = SessionToken::from_client(token).digest(&self.config.secret_key);
        let now = self.clock.now();

        let mut session = self
            .session_repo
            .find_session(&digest)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        if session.is_expired_at(now) {
            self.session_repo.delete_session(&digest).await?;
            tracing::debug!(session = ?digest, "Expired session purged on access");
            return Err(AuthError::Unauthenticated);
        }

        self.session_repo.touch_session(&digest, now).await?;
        session.touch(now);

        let user = self
            .user_repo
            .find_user_by_id(&session.user_id)
            .await?
            .filter(User::can_login)
            .ok_or(AuthError::Unauthenticated)?;

        Ok(CurrentSession { user, session })
    }

    /// `true` when the token resolves. Store failures count as `false`.
    pub async fn is_valid(&self, token: &str) -> bool {
        self.resolve(token).await.is_ok()
    }
}
