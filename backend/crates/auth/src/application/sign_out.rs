//! Sign Out Use Case
//!
//! Revocation is idempotent: an unknown or already deleted token is fine.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::activity;
use crate::application::config::AuthConfig;
use crate::domain::entity::{
    activity_entry::{ActivityEntry, actions},
    user::User,
};
use crate::domain::repository::{ActivityLogRepository, AuthSessionRepository};
use crate::domain::value_object::session_token::SessionToken;
use crate::error::AuthResult;

pub struct SignOutUseCase<S, L>
where
    S: AuthSessionRepository,
    L: ActivityLogRepository,
{
    session_repo: Arc<S>,
    activity_repo: Arc<L>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<S, L> SignOutUseCase<S, L>
where
    S: AuthSessionRepository,
    L: ActivityLogRepository,
{
    pub fn new(
        session_repo: Arc<S>,
        activity_repo: Arc<L>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session_repo,
            activity_repo,
            config,
            clock,
        }
    }

    /// Revoke one session. `actor` is the resolved user, when there was one.
    pub async fn execute(&self, token: &str, actor: Option<&User>) -> AuthResult<()> {
        if token.is_empty() {
            return Ok(());
        }

        let digest = SessionToken::from_client(token).digest(&self.config.secret_key);
        self.session_repo.delete_session(&digest).await?;

        if let Some(user) = actor {
            activity::record(
                self.activity_repo.as_ref(),
                ActivityEntry::new(actions::SIGN_OUT, self.clock.now())
                    .actor(user)
                    .entity("user", user.user_id),
            )
            .await;
            tracing::info!(user_id = %user.user_id, "User signed out");
        }

        Ok(())
    }

    /// Revoke every session of a user
    pub async fn execute_all(&self, user: &User) -> AuthResult<u64> {
        let deleted = self
            .session_repo
            .delete_sessions_for_user(&user.user_id)
            .await?;

        activity::record(
            self.activity_repo.as_ref(),
            ActivityEntry::new(actions::SIGN_OUT, self.clock.now())
                .actor(user)
                .entity("user", user.user_id)
                .details(serde_json::json!({ "all_sessions": true, "count": deleted })),
        )
        .await;

        tracing::info!(user_id = %user.user_id, sessions_deleted = deleted, "User signed out everywhere");
        Ok(deleted)
    }
}
