//! TOTP Setup Use Case
//!
//! Two-step enrollment. `start` parks a fresh secret in a `TotpEnrollment`
//! challenge; `confirm` binds it to the credential only after one code
//! verifies against it. Until then the credential is untouched, so an
//! abandoned or expired enrollment is never active.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::activity;
use crate::application::config::AuthConfig;
use crate::domain::entity::{
    activity_entry::{ActivityEntry, actions},
    credential::Credential,
    pending_challenge::{ChallengePurpose, MAX_FAILED_ATTEMPTS, PendingChallenge},
    user::User,
};
use crate::domain::repository::{
    ActivityLogRepository, CredentialRepository, PendingChallengeRepository,
};
use crate::domain::value_object::{
    session_token::SessionToken, totp_secret::TotpSecret, user_id::UserId,
};
use crate::error::{AuthError, AuthResult};

/// What an authenticator app needs
#[derive(Debug)]
pub struct TotpEnrollment {
    pub secret: TotpSecret,
    pub otpauth_url: String,
    /// Base64 PNG
    pub qr_code_base64: String,
}

pub struct TotpSetupUseCase<C, P, L>
where
    C: CredentialRepository,
    P: PendingChallengeRepository,
    L: ActivityLogRepository,
{
    credential_repo: Arc<C>,
    challenge_repo: Arc<P>,
    activity_repo: Arc<L>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<C, P, L> TotpSetupUseCase<C, P, L>
where
    C: CredentialRepository,
    P: PendingChallengeRepository,
    L: ActivityLogRepository,
{
    pub fn new(
        credential_repo: Arc<C>,
        challenge_repo: Arc<P>,
        activity_repo: Arc<L>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credential_repo,
            challenge_repo,
            activity_repo,
            config,
            clock,
        }
    }

    /// Generate a secret and hold it pending. Starting again replaces any
    /// earlier pending secret.
    pub async fn start(&self, user: &User) -> AuthResult<TotpEnrollment> {
        let secret = TotpSecret::generate();
        let account = user.email.as_str();
        let otpauth_url = secret.provisioning_uri(&self.config.totp_issuer, account)?;
        let qr_code_base64 = secret.qr_code_base64(&self.config.totp_issuer, account)?;

        self.challenge_repo
            .delete_challenges_for_user(&user.user_id, ChallengePurpose::TotpEnrollment)
            .await?;

        // Looked up by user, so the token itself is never handed out.
        let challenge = PendingChallenge::totp_enrollment(
            SessionToken::generate().digest(&self.config.secret_key),
            user.user_id,
            secret.clone(),
            self.clock.now(),
            self.config.pending_ttl,
        );
        self.challenge_repo.insert_challenge(&challenge).await?;

        tracing::info!(user_id = %user.user_id, "TOTP setup initiated");

        Ok(TotpEnrollment {
            secret,
            otpauth_url,
            qr_code_base64,
        })
    }

    /// Verify the first code against the pending secret and, on success,
    /// bind it to the credential.
    ///
    /// `Ok(false)` for a wrong code. `TotpNotEnrolled` when nothing (or
    /// nothing live) is pending.
    pub async fn confirm(&self, user: &User, code: &str) -> AuthResult<bool> {
        let now = self.clock.now();

        let challenge = self
            .challenge_repo
            .find_enrollment_for_user(&user.user_id)
            .await?
            .ok_or(AuthError::TotpNotEnrolled)?;
        let digest = challenge.token_digest;

        if challenge.is_expired_at(now) {
            self.challenge_repo.consume_challenge(&digest).await?;
            return Err(AuthError::TotpNotEnrolled);
        }

        let secret = challenge
            .totp_secret
            .as_ref()
            .ok_or_else(|| AuthError::Internal("Enrollment without secret".to_string()))?;

        if !secret.verify_at(code, now)? {
            let failures = self.challenge_repo.record_challenge_failure(&digest).await?;
            tracing::warn!(user_id = %user.user_id, failures = ?failures, "Invalid TOTP code at enrollment");

            if failures.is_some_and(|n| n >= MAX_FAILED_ATTEMPTS) {
                self.challenge_repo.consume_challenge(&digest).await?;
                return Err(AuthError::MfaAttemptsExceeded);
            }
            return Ok(false);
        }

        let Some(consumed) = self.challenge_repo.consume_challenge(&digest).await? else {
            return Err(AuthError::TotpNotEnrolled);
        };
        let secret = consumed
            .totp_secret
            .ok_or_else(|| AuthError::Internal("Enrollment without secret".to_string()))?;

        let mut credential = self.load_credential(&user.user_id).await?;
        credential.enable_totp(secret, now);
        self.credential_repo.update_credential(&credential).await?;

        activity::record(
            self.activity_repo.as_ref(),
            ActivityEntry::new(actions::TOTP_ENABLED, now)
                .actor(user)
                .entity("user", user.user_id),
        )
        .await;

        tracing::info!(user_id = %user.user_id, "TOTP enabled");
        Ok(true)
    }

    /// Check a code against the user's active secret. No side effects.
    pub async fn check(&self, user_id: &UserId, code: &str) -> AuthResult<bool> {
        let credential = self.load_credential(user_id).await?;
        let secret = credential.active_totp().ok_or(AuthError::TotpNotEnrolled)?;
        secret.verify_at(code, self.clock.now())
    }

    /// Clear the secret and flag. Also drops any pending enrollment.
    pub async fn disable(&self, user: &User) -> AuthResult<()> {
        let now = self.clock.now();
        let mut credential = self.load_credential(&user.user_id).await?;

        self.challenge_repo
            .delete_challenges_for_user(&user.user_id, ChallengePurpose::TotpEnrollment)
            .await?;

        if !credential.totp_enabled && credential.totp_secret.is_none() {
            return Ok(());
        }

        credential.disable_totp(now);
        self.credential_repo.update_credential(&credential).await?;

        activity::record(
            self.activity_repo.as_ref(),
            ActivityEntry::new(actions::TOTP_DISABLED, now)
                .actor(user)
                .entity("user", user.user_id),
        )
        .await;

        tracing::info!(user_id = %user.user_id, "TOTP disabled");
        Ok(())
    }

    async fn load_credential(&self, user_id: &UserId) -> AuthResult<Credential> {
        self.credential_repo
            .find_credential(user_id)
            .await?
            .ok_or_else(|| AuthError::Internal("Credential not found".to_string()))
    }
}
