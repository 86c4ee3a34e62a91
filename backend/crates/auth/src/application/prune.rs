//! Prune Use Case
//!
//! Deletes expired sessions and pending challenges. Every statement is a
//! plain `DELETE ... WHERE expires_at < now`, so running it concurrently or
//! repeatedly is harmless.

use std::sync::Arc;

use platform::clock::Clock;

use crate::domain::repository::{AuthSessionRepository, PendingChallengeRepository};
use crate::error::AuthResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub sessions_deleted: u64,
    pub challenges_deleted: u64,
}

pub struct PruneUseCase<S, P>
where
    S: AuthSessionRepository,
    P: PendingChallengeRepository,
{
    session_repo: Arc<S>,
    challenge_repo: Arc<P>,
    clock: Arc<dyn Clock>,
}

impl<S, P> PruneUseCase<S, P>
where
    S: AuthSessionRepository,
    P: PendingChallengeRepository,
{
    pub fn new(session_repo: Arc<S>, challenge_repo: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self {
            session_repo,
            challenge_repo,
            clock,
        }
    }

    pub async fn execute(&self) -> AuthResult<PruneReport> {
        let now = self.clock.now();

        let report = PruneReport {
            sessions_deleted: self.session_repo.delete_expired_sessions(now).await?,
            challenges_deleted: self.challenge_repo.delete_expired_challenges(now).await?,
        };

        tracing::info!(
            sessions_deleted = report.sessions_deleted,
            challenges_deleted = report.challenges_deleted,
            "Cleaned up expired auth records"
        );

        Ok(report)
    }
}
