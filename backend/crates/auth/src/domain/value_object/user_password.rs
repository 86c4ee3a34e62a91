//! User Password Value Object
//!
//! Domain wrapper over `platform::password`. Argon2 is CPU-bound for tens of
//! milliseconds, so hashing and verification run on the blocking pool.

use std::fmt;

use platform::password::{ClearTextPassword, HashedPassword, PasswordPolicyError};

use crate::error::{AuthError, AuthResult};

// ============================================================================
// Raw Password (User Input)
// ============================================================================

/// Clear text password from a request body. Zeroized on drop.
pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    /// A password that is about to be stored: the policy applies.
    pub fn new(raw: String) -> AuthResult<Self> {
        ClearTextPassword::new(raw)
            .map(Self)
            .map_err(|e| AuthError::PasswordPolicy(policy_message(&e)))
    }

    /// A sign-in attempt: normalized, never rejected.
    pub fn for_login(raw: String) -> Self {
        Self(ClearTextPassword::for_verification(raw))
    }
}

fn policy_message(err: &PasswordPolicyError) -> String {
    match err {
        PasswordPolicyError::TooShort { min, .. } => {
            format!("password must be at least {min} characters")
        }
        PasswordPolicyError::TooLong { max, .. } => {
            format!("password must be at most {max} characters")
        }
        other => other.to_string(),
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

// ============================================================================
// User Password (Hashed, for storage)
// ============================================================================

/// Argon2id PHC string as stored in `user_credentials.password_hash`
#[derive(Clone, PartialEq, Eq)]
pub struct UserPassword(HashedPassword);

impl UserPassword {
    pub async fn hash(raw: RawPassword, pepper: Option<Vec<u8>>) -> AuthResult<Self> {
        let hashed = tokio::task::spawn_blocking(move || raw.0.hash(pepper.as_deref()))
            .await?
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(Self(hashed))
    }

    /// Malformed stored values are kept; they just never verify.
    pub fn from_db(phc_string: impl Into<String>) -> Self {
        Self(HashedPassword::from_stored(phc_string))
    }

    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }

    pub async fn verify(&self, raw: RawPassword, pepper: Option<Vec<u8>>) -> AuthResult<bool> {
        let hashed = self.0.clone();
        let ok =
            tokio::task::spawn_blocking(move || hashed.verify(&raw.0, pepper.as_deref())).await?;
        Ok(ok)
    }

    /// Burn the same Argon2 cost as a real verification and return `false`.
    /// Used when the email is unknown.
    pub async fn verify_dummy(raw: RawPassword, pepper: Option<Vec<u8>>) -> AuthResult<bool> {
        tokio::task::spawn_blocking(move || {
            let _ = HashedPassword::dummy().verify(&raw.0, pepper.as_deref());
        })
        .await?;
        Ok(false)
    }
}

impl fmt::Debug for UserPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}
