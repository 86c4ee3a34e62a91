//! Issue Session Use Case
//!
//! Mints a bearer token and stores its session row. The token is only
//! returned once the insert has succeeded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::domain::entity::auth_session::AuthSession;
use crate::domain::repository::AuthSessionRepository;
use crate::domain::value_object::{session_token::SessionToken, user_id::UserId};
use crate::error::AuthResult;

#[derive(Debug)]
pub struct IssuedSession {
    pub token: SessionToken,
    pub expires_at: DateTime<Utc>,
}

pub struct IssueSessionUseCase<S>
where
    S: AuthSessionRepository,
{
    session_repo: Arc<S>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> IssueSessionUseCase<S>
where
    S: AuthSessionRepository,
{
    pub fn new(session_repo: Arc<S>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            session_repo,
            config,
            clock,
        }
    }

    pub async fn execute(&self, user_id: &UserId) -> AuthResult<IssuedSession> {
        let token = SessionToken::generate();
        let session = AuthSession::new(
            token.digest(&self.config.secret_key),
            *user_id,
            self.clock.now(),
            self.config.session_ttl,
        );

        self.session_repo.insert_session(&session).await?;

        tracing::debug!(
            user_id = %user_id,
            session = ?session.token_digest,
            expires_at = %session.expires_at,
            "Session issued"
        );

        Ok(IssuedSession {
            token,
            expires_at: session.expires_at,
        })
    }
}
