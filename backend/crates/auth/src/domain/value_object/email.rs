//! Email Value Object
//!
//! Household members sign in with their email address. It is trimmed and
//! lowercased once here so lookups never depend on how it was typed.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::AuthError;

/// Maximum email length (RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;
const LOCAL_PART_MAX_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn new(email: impl AsRef<str>) -> Result<Self, AuthError> {
        let email = email.as_ref().trim().to_lowercase();

        if email.is_empty() {
            return Err(AuthError::InvalidInput("email cannot be empty".into()));
        }
        if email.len() > EMAIL_MAX_LENGTH {
            return Err(AuthError::InvalidInput(format!(
                "email must be at most {EMAIL_MAX_LENGTH} characters"
            )));
        }
        if !is_plausible_address(&email) {
            return Err(AuthError::InvalidInput("invalid email format".into()));
        }

        Ok(Self(email))
    }

    /// Rows are written through [`Email::new`], so they are trusted as-is.
    pub fn from_db(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One `@`, a non-empty local part, a dotted domain of letters, digits and
/// hyphens. Deliverability is not our concern.
fn is_plausible_address(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > LOCAL_PART_MAX_LENGTH || domain.contains('@') {
        return false;
    }
    if local.chars().any(char::is_whitespace) {
        return false;
    }

    !domain.is_empty()
        && domain.contains('.')
        && domain
            .split('.')
            .all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
}

impl FromStr for Email {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Email::new(s)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
