//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

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
use crate::domain::value_object::{
    email::Email, session_token::TokenDigest, totp_secret::TotpSecret, user_id::UserId,
    user_password::UserPassword,
};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

const USER_COLUMNS: &str = r#"
    user_id,
    email,
    display_name,
    is_admin,
    is_active,
    last_login_at,
    created_at,
    updated_at
"#;

impl UserRepository for PgAuthRepository {
    async fn insert_user_with_credential(
        &self,
        user: &User,
        credential: &Credential,
    ) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                email,
                display_name,
                is_admin,
                is_active,
                last_login_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.as_str())
        .bind(&user.display_name)
        .bind(user.is_admin)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::EmailTaken,
            other => AuthError::Database(other),
        })?;

        insert_credential_row(&mut *tx, credential).await?;

        // Dropping `tx` on an early return rolls back
        tx.commit().await?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn update_user(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                display_name = $3,
                is_admin = $4,
                is_active = $5,
                last_login_at = $6,
                updated_at = $7
            WHERE user_id = $1
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.as_str())
        .bind(&user.display_name)
        .bind(user.is_admin)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Credential Repository Implementation
// ============================================================================

impl CredentialRepository for PgAuthRepository {
    async fn insert_credential(&self, credential: &Credential) -> AuthResult<()> {
        insert_credential_row(&self.pool, credential).await
    }

    async fn find_credential(&self, user_id: &UserId) -> AuthResult<Option<Credential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT
                user_id,
                password_hash,
                totp_secret,
                totp_enabled,
                created_at,
                updated_at
            FROM user_credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CredentialRow::into_credential).transpose()
    }

    async fn update_credential(&self, credential: &Credential) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE user_credentials SET
                password_hash = $2,
                totp_secret = $3,
                totp_enabled = $4,
                updated_at = $5
            WHERE user_id = $1
            "#,
        )
        .bind(credential.user_id.as_uuid())
        .bind(credential.password_hash.as_phc_string())
        .bind(credential.totp_secret.as_ref().map(TotpSecret::as_base32))
        .bind(credential.totp_enabled)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

async fn insert_credential_row<'c>(
    executor: impl sqlx::PgExecutor<'c>,
    credential: &Credential,
) -> AuthResult<()> {
    sqlx::query(
        r#"
        INSERT INTO user_credentials (
            user_id,
            password_hash,
            totp_secret,
            totp_enabled,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(credential.user_id.as_uuid())
    .bind(credential.password_hash.as_phc_string())
    .bind(credential.totp_secret.as_ref().map(TotpSecret::as_base32))
    .bind(credential.totp_enabled)
    .bind(credential.created_at)
    .bind(credential.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

// ============================================================================
// Auth Session Repository Implementation
// ============================================================================

impl AuthSessionRepository for PgAuthRepository {
    async fn insert_session(&self, session: &AuthSession) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                token_digest,
                user_id,
                created_at,
                last_seen_at,
                expires_at
            ) VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&session.token_digest.as_bytes()[..])
        .bind(session.user_id.as_uuid())
        .bind(session.created_at)
        .bind(session.last_seen_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session(&self, digest: &TokenDigest) -> AuthResult<Option<AuthSession>> {
        let row = sqlx::query_as::<_, AuthSessionRow>(
            r#"
            SELECT
                token_digest,
                user_id,
                created_at,
                last_seen_at,
                expires_at
            FROM auth_sessions
            WHERE token_digest = $1
            "#,
        )
        .bind(&digest.as_bytes()[..])
        .fetch_optional(&self.pool)
        .await?;

        row.map(AuthSessionRow::into_session).transpose()
    }

    async fn touch_session(&self, digest: &TokenDigest, now: DateTime<Utc>) -> AuthResult<()> {
        sqlx::query("UPDATE auth_sessions SET last_seen_at = $2 WHERE token_digest = $1")
            .bind(&digest.as_bytes()[..])
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_session(&self, digest: &TokenDigest) -> AuthResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE token_digest = $1")
            .bind(&digest.as_bytes()[..])
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Pending Challenge Repository Implementation
// ============================================================================

const CHALLENGE_COLUMNS: &str = r#"
    token_digest,
    user_id,
    purpose,
    totp_secret,
    failed_attempts,
    created_at,
    expires_at
"#;

impl PendingChallengeRepository for PgAuthRepository {
    async fn insert_challenge(&self, challenge: &PendingChallenge) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_pending_challenges (
                token_digest,
                user_id,
                purpose,
                totp_secret,
                failed_attempts,
                created_at,
                expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&challenge.token_digest.as_bytes()[..])
        .bind(challenge.user_id.as_uuid())
        .bind(challenge.purpose.code())
        .bind(challenge.totp_secret.as_ref().map(TotpSecret::as_base32))
        .bind(i16::try_from(challenge.failed_attempts).unwrap_or(i16::MAX))
        .bind(challenge.created_at)
        .bind(challenge.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_challenge(&self, digest: &TokenDigest) -> AuthResult<Option<PendingChallenge>> {
        let row = sqlx::query_as::<_, PendingChallengeRow>(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM auth_pending_challenges WHERE token_digest = $1"
        ))
        .bind(&digest.as_bytes()[..])
        .fetch_optional(&self.pool)
        .await?;

        row.map(PendingChallengeRow::into_challenge).transpose()
    }

    async fn find_enrollment_for_user(
        &self,
        user_id: &UserId,
    ) -> AuthResult<Option<PendingChallenge>> {
        let row = sqlx::query_as::<_, PendingChallengeRow>(&format!(
            r#"
            SELECT {CHALLENGE_COLUMNS}
            FROM auth_pending_challenges
            WHERE user_id = $1 AND purpose = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(ChallengePurpose::TotpEnrollment.code())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PendingChallengeRow::into_challenge).transpose()
    }

    async fn record_challenge_failure(&self, digest: &TokenDigest) -> AuthResult<Option<u16>> {
        let failures = sqlx::query_scalar::<_, i16>(
            r#"
            UPDATE auth_pending_challenges
            SET failed_attempts = failed_attempts + 1
            WHERE token_digest = $1
            RETURNING failed_attempts
            "#,
        )
        .bind(&digest.as_bytes()[..])
        .fetch_optional(&self.pool)
        .await?;

        Ok(failures.map(|n| u16::try_from(n).unwrap_or(0)))
    }

    async fn consume_challenge(
        &self,
        digest: &TokenDigest,
    ) -> AuthResult<Option<PendingChallenge>> {
        let row = sqlx::query_as::<_, PendingChallengeRow>(&format!(
            "DELETE FROM auth_pending_challenges WHERE token_digest = $1 RETURNING {CHALLENGE_COLUMNS}"
        ))
        .bind(&digest.as_bytes()[..])
        .fetch_optional(&self.pool)
        .await?;

        row.map(PendingChallengeRow::into_challenge).transpose()
    }

    async fn delete_challenges_for_user(
        &self,
        user_id: &UserId,
        purpose: ChallengePurpose,
    ) -> AuthResult<u64> {
        let deleted =
            sqlx::query("DELETE FROM auth_pending_challenges WHERE user_id = $1 AND purpose = $2")
                .bind(user_id.as_uuid())
                .bind(purpose.code())
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(deleted)
    }

    async fn delete_expired_challenges(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_pending_challenges WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Activity Log Repository Implementation
// ============================================================================

impl ActivityLogRepository for PgAuthRepository {
    async fn append_activity(&self, entry: &ActivityEntry) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_log (
                id,
                occurred_at,
                actor_user_id,
                actor_email,
                action,
                entity_type,
                entity_id,
                details
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.occurred_at)
        .bind(entry.actor_user_id.map(UserId::into_uuid))
        .bind(entry.actor_email.as_deref())
        .bind(&entry.action)
        .bind(entry.entity_type.as_deref())
        .bind(entry.entity_id.as_deref())
        .bind(entry.details.as_ref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    display_name: String,
    is_admin: bool,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            user_id: UserId::from_uuid(self.user_id),
            email: Email::from_db(self.email),
            display_name: self.display_name,
            is_admin: self.is_admin,
            is_active: self.is_active,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    user_id: Uuid,
    password_hash: String,
    totp_secret: Option<String>,
    totp_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CredentialRow {
    fn into_credential(self) -> AuthResult<Credential> {
        let totp_secret = self.totp_secret.map(TotpSecret::from_base32).transpose()?;

        Ok(Credential {
            user_id: UserId::from_uuid(self.user_id),
            password_hash: UserPassword::from_db(self.password_hash),
            totp_secret,
            totp_enabled: self.totp_enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuthSessionRow {
    token_digest: Vec<u8>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl AuthSessionRow {
    fn into_session(self) -> AuthResult<AuthSession> {
        Ok(AuthSession {
            token_digest: digest_from_row(&self.token_digest)?,
            user_id: UserId::from_uuid(self.user_id),
            created_at: self.created_at,
            last_seen_at: self.last_seen_at,
            expires_at: self.expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PendingChallengeRow {
    token_digest: Vec<u8>,
    user_id: Uuid,
    purpose: String,
    totp_secret: Option<String>,
    failed_attempts: i16,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl PendingChallengeRow {
    fn into_challenge(self) -> AuthResult<PendingChallenge> {
        let purpose = ChallengePurpose::from_code(&self.purpose).ok_or_else(|| {
            AuthError::Internal(format!("Unknown challenge purpose: {}", self.purpose))
        })?;

        Ok(PendingChallenge {
            token_digest: digest_from_row(&self.token_digest)?,
            user_id: UserId::from_uuid(self.user_id),
            purpose,
            totp_secret: self.totp_secret.map(TotpSecret::from_base32).transpose()?,
            failed_attempts: u16::try_from(self.failed_attempts).unwrap_or(0),
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

fn digest_from_row(bytes: &[u8]) -> AuthResult<TokenDigest> {
    TokenDigest::from_slice(bytes)
        .ok_or_else(|| AuthError::Internal("Malformed token digest in database".to_string()))
}
