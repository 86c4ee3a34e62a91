//! User Administration Use Case
//!
//! Account creation and maintenance used by the admin screens and by the
//! startup bootstrap. Passwords set here go through the policy, except the
//! operator-supplied bootstrap password.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::activity;
use crate::application::config::AuthConfig;
use crate::domain::entity::{
    activity_entry::{ActivityEntry, actions},
    credential::Credential,
    user::User,
};
use crate::domain::repository::{
    ActivityLogRepository, AuthSessionRepository, CredentialRepository, UserRepository,
};
use crate::domain::value_object::{
    email::Email,
    user_id::UserId,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

pub struct CreateUserInput {
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub is_admin: bool,
}

pub struct UserAdminUseCase<U, C, S, L>
where
    U: UserRepository,
    C: CredentialRepository,
    S: AuthSessionRepository,
    L: ActivityLogRepository,
{
    user_repo: Arc<U>,
    credential_repo: Arc<C>,
    session_repo: Arc<S>,
    activity_repo: Arc<L>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<U, C, S, L> UserAdminUseCase<U, C, S, L>
where
    U: UserRepository,
    C: CredentialRepository,
    S: AuthSessionRepository,
    L: ActivityLogRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        credential_repo: Arc<C>,
        session_repo: Arc<S>,
        activity_repo: Arc<L>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repo,
            credential_repo,
            session_repo,
            activity_repo,
            config,
            clock,
        }
    }

    pub async fn create_user(&self, input: CreateUserInput, actor: Option<&User>) -> AuthResult<User> {
        let raw = RawPassword::new(input.password)?;
        self.insert_new_user(&input.email, &input.display_name, raw, input.is_admin, actor)
            .await
    }

    async fn insert_new_user(
        &self,
        email: &str,
        display_name: &str,
        raw: RawPassword,
        is_admin: bool,
        actor: Option<&User>,
    ) -> AuthResult<User> {
        let email = Email::new(email)?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AuthError::InvalidInput("display name cannot be empty".into()));
        }

        if self.user_repo.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = UserPassword::hash(raw, self.config.pepper()).await?;
        let now = self.clock.now();

        let mut user = User::new(email, display_name, now);
        user.is_admin = is_admin;
        let credential = Credential::new(user.user_id, password_hash, now);

        self.user_repo
            .insert_user_with_credential(&user, &credential)
            .await?;

        let entry = ActivityEntry::new(actions::USER_CREATED, now)
            .entity("user", user.user_id)
            .details(serde_json::json!({ "email": user.email, "is_admin": user.is_admin }));
        self.record_as(entry, actor).await;

        tracing::info!(user_id = %user.user_id, is_admin = user.is_admin, "User created");
        Ok(user)
    }

    pub async fn set_password(
        &self,
        user_id: &UserId,
        password: String,
        actor: Option<&User>,
    ) -> AuthResult<()> {
        let raw = RawPassword::new(password)?;
        self.load_user(user_id).await?;
        let mut credential = self
            .credential_repo
            .find_credential(user_id)
            .await?
            .ok_or_else(|| AuthError::Internal("Credential not found".to_string()))?;

        let password_hash = UserPassword::hash(raw, self.config.pepper()).await?;
        let now = self.clock.now();
        credential.set_password(password_hash, now);
        self.credential_repo.update_credential(&credential).await?;

        let entry = ActivityEntry::new(actions::PASSWORD_CHANGED, now).entity("user", user_id);
        self.record_as(entry, actor).await;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub async fn set_admin(
        &self,
        user_id: &UserId,
        is_admin: bool,
        actor: Option<&User>,
    ) -> AuthResult<User> {
        reject_self_change(user_id, actor, "you cannot change your own admin access")?;
        let mut user = self.load_user(user_id).await?;
        let now = self.clock.now();
        user.set_admin(is_admin, now);
        self.user_repo.update_user(&user).await?;

        let entry = ActivityEntry::new(actions::ROLE_CHANGED, now)
            .entity("user", user_id)
            .details(serde_json::json!({ "is_admin": is_admin }));
        self.record_as(entry, actor).await;

        tracing::info!(user_id = %user_id, is_admin, "User role changed");
        Ok(user)
    }

    /// Deactivating also revokes every session of the user.
    pub async fn set_active(
        &self,
        user_id: &UserId,
        is_active: bool,
        actor: Option<&User>,
    ) -> AuthResult<User> {
        reject_self_change(user_id, actor, "you cannot disable your own account")?;
        let mut user = self.load_user(user_id).await?;
        let now = self.clock.now();
        user.set_active(is_active, now);
        self.user_repo.update_user(&user).await?;

        if !is_active {
            let revoked = self.session_repo.delete_sessions_for_user(user_id).await?;
            tracing::info!(user_id = %user_id, sessions_deleted = revoked, "User deactivated");
        }

        let entry = ActivityEntry::new(actions::STATUS_CHANGED, now)
            .entity("user", user_id)
            .details(serde_json::json!({ "is_active": is_active }));
        self.record_as(entry, actor).await;
        Ok(user)
    }

    /// Make sure the configured administrator exists, is active, is an admin
    /// and has exactly this password. Safe to run on every startup.
    ///
    /// The configured password is the operator's choice, so the policy is not
    /// applied to it.
    pub async fn ensure_bootstrap_admin(&self, email: &str, password: String) -> AuthResult<User> {
        let raw = RawPassword::for_login(password);

        let Some(mut user) = self.user_repo.find_user_by_email(&Email::new(email)?).await? else {
            return self.insert_new_user(email, "Admin", raw, true, None).await;
        };

        let now = self.clock.now();
        user.set_admin(true, now);
        user.set_active(true, now);
        self.user_repo.update_user(&user).await?;

        let password_hash = UserPassword::hash(raw, self.config.pepper()).await?;
        match self.credential_repo.find_credential(&user.user_id).await? {
            Some(mut credential) => {
                credential.set_password(password_hash, now);
                self.credential_repo.update_credential(&credential).await?;
            }
            None => {
                let credential = Credential::new(user.user_id, password_hash, now);
                self.credential_repo.insert_credential(&credential).await?;
            }
        }

        tracing::info!(user_id = %user.user_id, "Bootstrap admin ensured");
        Ok(user)
    }

    async fn load_user(&self, user_id: &UserId) -> AuthResult<User> {
        self.user_repo
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::InvalidInput("unknown user".to_string()))
    }

    async fn record_as(&self, entry: ActivityEntry, actor: Option<&User>) {
        let entry = match actor {
            Some(actor) => entry.actor(actor),
            None => entry,
        };
        activity::record(self.activity_repo.as_ref(), entry).await;
    }
}

/// An administrator must not lock themselves out
fn reject_self_change(user_id: &UserId, actor: Option<&User>, message: &str) -> AuthResult<()> {
    match actor {
        Some(actor) if &actor.user_id == user_id => Err(AuthError::InvalidInput(message.to_string())),
        _ => Ok(()),
    }
}
