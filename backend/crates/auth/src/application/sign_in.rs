//! Sign In Use Case
//!
//! Password first. If the member has TOTP enabled no session is issued yet:
//! a single-use `SignIn` challenge is stored and its token handed back, and
//! [`SignInUseCase::complete_mfa`] finishes the job once a valid code arrives.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::activity;
use crate::application::config::AuthConfig;
use crate::application::issue_session::{IssueSessionUseCase, IssuedSession};
use crate::domain::entity::{
    activity_entry::{ActivityEntry, actions},
    credential::Credential,
    pending_challenge::{ChallengePurpose, MAX_FAILED_ATTEMPTS, PendingChallenge},
    user::User,
};
use crate::domain::repository::{
    ActivityLogRepository, AuthSessionRepository, CredentialRepository,
    PendingChallengeRepository, UserRepository,
};
use crate::domain::value_object::{
    email::Email,
    session_token::SessionToken,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

pub struct SignInInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug)]
pub struct SignedIn {
    pub user: User,
    pub session: IssuedSession,
}

#[derive(Debug)]
pub enum SignInOutcome {
    SignedIn(SignedIn),
    /// Password accepted; `pending_token` identifies the challenge to answer
    MfaRequired { pending_token: SessionToken },
}

impl SignInOutcome {
    /// The session, or `MfaRequired` if a code is still owed
    pub fn into_signed_in(self) -> AuthResult<SignedIn> {
        match self {
            SignInOutcome::SignedIn(signed_in) => Ok(signed_in),
            SignInOutcome::MfaRequired { .. } => Err(AuthError::MfaRequired),
        }
    }
}

pub struct SignInUseCase<U, C, S, P, L>
where
    U: UserRepository,
    C: CredentialRepository,
    S: AuthSessionRepository,
    P: PendingChallengeRepository,
    L: ActivityLogRepository,
{
    user_repo: Arc<U>,
    credential_repo: Arc<C>,
    session_repo: Arc<S>,
    challenge_repo: Arc<P>,
    activity_repo: Arc<L>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<U, C, S, P, L> SignInUseCase<U, C, S, P, L>
where
    U: UserRepository,
    C: CredentialRepository,
    S: AuthSessionRepository,
    P: PendingChallengeRepository,
    L: ActivityLogRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        credential_repo: Arc<C>,
        session_repo: Arc<S>,
        challenge_repo: Arc<P>,
        activity_repo: Arc<L>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repo,
            credential_repo,
            session_repo,
            challenge_repo,
            activity_repo,
            config,
            clock,
        }
    }

    /// Check email and password.
    ///
    /// Unknown email, wrong password and inactive account all yield
    /// `InvalidCredentials`, and all pay for one Argon2 verification.
    pub async fn authenticate(&self, email: &str, password: String) -> AuthResult<(User, Credential)> {
        let raw = RawPassword::for_login(password);

        let Ok(email) = Email::new(email) else {
            UserPassword::verify_dummy(raw, self.config.pepper()).await?;
            return Err(AuthError::InvalidCredentials);
        };

        let Some(user) = self.user_repo.find_user_by_email(&email).await? else {
            UserPassword::verify_dummy(raw, self.config.pepper()).await?;
            return Err(AuthError::InvalidCredentials);
        };

        let Some(credential) = self.credential_repo.find_credential(&user.user_id).await? else {
            tracing::warn!(user_id = %user.user_id, "User has no credential row");
            UserPassword::verify_dummy(raw, self.config.pepper()).await?;
            return Err(AuthError::InvalidCredentials);
        };

        let password_ok = credential
            .password_hash
            .verify(raw, self.config.pepper())
            .await?;

        if !password_ok || !user.can_login() {
            return Err(AuthError::InvalidCredentials);
        }

        Ok((user, credential))
    }

    pub async fn execute(&self, input: SignInInput) -> AuthResult<SignInOutcome> {
        let (user, credential) = self.authenticate(&input.email, input.password).await?;

        if credential.requires_totp() {
            // One live challenge per user, so the attempt cap is per user
            self.challenge_repo
                .delete_challenges_for_user(&user.user_id, ChallengePurpose::SignIn)
                .await?;

            let pending_token = SessionToken::generate();
            let challenge = PendingChallenge::sign_in(
                pending_token.digest(&self.config.secret_key),
                user.user_id,
                self.clock.now(),
                self.config.pending_ttl,
            );
            self.challenge_repo.insert_challenge(&challenge).await?;

            tracing::info!(user_id = %user.user_id, "Password accepted, TOTP code required");
            return Ok(SignInOutcome::MfaRequired { pending_token });
        }

        self.finish(user, false).await.map(SignInOutcome::SignedIn)
    }

    /// Answer a pending `SignIn` challenge with a TOTP code.
    ///
    /// Missing, expired or foreign challenges are `Unauthenticated`. A wrong
    /// code is `InvalidMfaCode` until the attempt cap, after which the
    /// challenge is deleted and the member must sign in again.
    pub async fn complete_mfa(&self, pending_token: &str, code: &str) -> AuthResult<SignedIn> {
        let digest = SessionToken::from_client(pending_token).digest(&self.config.secret_key);
        let now = self.clock.now();

        let challenge = self
            .challenge_repo
            .find_challenge(&digest)
            .await?
            .filter(|c| c.purpose == ChallengePurpose::SignIn)
            .ok_or(AuthError::Unauthenticated)?;

        if challenge.is_expired_at(now) {
            self.challenge_repo.consume_challenge(&digest).await?;
            return Err(AuthError::Unauthenticated);
        }

        let user = self.user_repo.find_user_by_id(&challenge.user_id).await?;
        let credential = self.credential_repo.find_credential(&challenge.user_id).await?;

        // TOTP switched off or account disabled since the password step
        let (Some(user), Some(secret)) = (
            user.filter(User::can_login),
            credential.as_ref().and_then(Credential::active_totp),
        ) else {
            self.challenge_repo.consume_challenge(&digest).await?;
            return Err(AuthError::Unauthenticated);
        };

        if !secret.verify_at(code, now)? {
            let failures = self.challenge_repo.record_challenge_failure(&digest).await?;
            tracing::warn!(user_id = %user.user_id, failures = ?failures, "Invalid TOTP code at sign-in");

            return match failures {
                Some(n) if n >= MAX_FAILED_ATTEMPTS => {
                    self.challenge_repo.consume_challenge(&digest).await?;
                    Err(AuthError::MfaAttemptsExceeded)
                }
                Some(_) => Err(AuthError::InvalidMfaCode),
                None => Err(AuthError::Unauthenticated),
            };
        }

        // Whoever deletes the row owns the sign-in
        if self.challenge_repo.consume_challenge(&digest).await?.is_none() {
            return Err(AuthError::Unauthenticated);
        }

        self.finish(user, true).await
    }

    async fn finish(&self, mut user: User, with_totp: bool) -> AuthResult<SignedIn> {
        let issuer = IssueSessionUseCase::new(
            self.session_repo.clone(),
            self.config.clone(),
            self.clock.clone(),
        );
        let session = issuer.execute(&user.user_id).await?;

        user.record_login(self.clock.now());
        if let Err(e) = self.user_repo.update_user(&user).await {
            tracing::warn!(error = %e, user_id = %user.user_id, "Failed to record last login");
        }

        activity::record(
            self.activity_repo.as_ref(),
            ActivityEntry::new(actions::SIGN_IN, self.clock.now())
                .actor(&user)
                .entity("user", user.user_id)
                .details(serde_json::json!({ "totp": with_totp })),
        )
        .await;

        tracing::info!(user_id = %user.user_id, totp = with_totp, "User signed in");

        Ok(SignedIn { user, session })
    }
}
