//! Password Hashing and Verification
//!
//! - Argon2id hashing with a fresh 128-bit salt per hash (PHC string output)
//! - Zeroization of clear text on drop
//! - Verification that never errors on a malformed hash
//! - A dummy hash so "unknown account" costs the same as "wrong password"
//!
//! Policy (length, control characters, common patterns) is applied only when a
//! password is being *set*. Verification normalizes but never rejects input.

use std::fmt;
use std::sync::OnceLock;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::random_bytes;

/// Minimum password length in code points
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length in code points
pub const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("Password must be at most {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },

    #[error("Password cannot be empty or contain only whitespace")]
    EmptyOrWhitespace,

    #[error("Password contains invalid control characters")]
    InvalidCharacter,

    #[error("Password is too common or follows a predictable pattern")]
    CommonPattern,
}

#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password, wiped from memory when dropped.
///
/// Not `Clone`, and `Debug` is redacted.
///
/// ```rust
/// use platform::password::ClearTextPassword;
///
/// let password = ClearTextPassword::new("correct horse battery".to_string()).unwrap();
/// let hashed = password.hash(None).unwrap();
/// assert!(hashed.verify(&password, None));
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Validate a password that is about to be stored.
    ///
    /// NFKC-normalized, 8..=128 code points, no control characters other than
    /// space/tab/newline, not a well-known weak pattern.
    pub fn new(raw: String) -> Result<Self, PasswordPolicyError> {
        let normalized: String = raw.nfkc().collect();

        if normalized.trim().is_empty() {
            return Err(PasswordPolicyError::EmptyOrWhitespace);
        }

        let char_count = normalized.chars().count();
        if char_count < MIN_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: MIN_PASSWORD_LENGTH,
                actual: char_count,
            });
        }
        if char_count > MAX_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooLong {
                max: MAX_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        if normalized
            .chars()
            .any(|ch| ch.is_control() && ch != '\t' && ch != '\n')
        {
            return Err(PasswordPolicyError::InvalidCharacter);
        }

        if is_common_pattern(&normalized) {
            return Err(PasswordPolicyError::CommonPattern);
        }

        Ok(Self(normalized))
    }

    /// Wrap a login attempt. Normalized like [`ClearTextPassword::new`] but no
    /// policy is applied: a stored password that predates the policy must still
    /// verify, and a policy failure must not become a distinguishable signal.
    pub fn for_verification(raw: String) -> Self {
        Self(raw.nfkc().collect())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    fn peppered(&self, pepper: Option<&[u8]>) -> Vec<u8> {
        let mut bytes = self.as_bytes().to_vec();
        if let Some(p) = pepper {
            bytes.extend_from_slice(p);
        }
        bytes
    }

    /// Hash with Argon2id (default OWASP parameters: m=19 MiB, t=2, p=1)
    pub fn hash(&self, pepper: Option<&[u8]>) -> Result<HashedPassword, PasswordHashError> {
        let mut password_bytes = self.peppered(pepper);
        let salt = SaltString::generate(&mut OsRng);

        let result = Argon2::default()
            .hash_password(&password_bytes, &salt)
            .map(|hash| HashedPassword {
                hash: hash.to_string(),
            })
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()));

        password_bytes.zeroize();
        result
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Argon2id hash in PHC string format (algorithm, params, salt, hash).
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Parse a PHC string (e.g. from the database)
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;
        Ok(Self { hash })
    }

    /// Wrap a stored value without parsing it. A malformed value simply never
    /// verifies.
    pub fn from_stored(s: impl Into<String>) -> Self {
        Self { hash: s.into() }
    }

    /// A hash of random bytes, computed once per process.
    ///
    /// Verified against when the account does not exist, so that path pays the
    /// same Argon2 cost as a wrong password.
    pub fn dummy() -> &'static HashedPassword {
        static DUMMY: OnceLock<HashedPassword> = OnceLock::new();
        DUMMY.get_or_init(|| {
            let filler = ClearTextPassword(crate::crypto::to_base64(&random_bytes(24)));
            filler.hash(None).unwrap_or_else(|_| HashedPassword {
                hash: String::new(),
            })
        })
    }

    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }

    /// Verify a password against this hash.
    ///
    /// Returns `false` for a malformed hash instead of failing. The digest
    /// comparison inside `argon2` is constant-time.
    pub fn verify(&self, password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.hash) else {
            return false;
        };

        let mut password_bytes = password.peppered(pepper);
        let ok = Argon2::default()
            .verify_password(&password_bytes, &parsed_hash)
            .is_ok();
        password_bytes.zeroize();
        ok
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn is_common_pattern(password: &str) -> bool {
    let lower = password.to_lowercase();

    let mut chars = lower.chars();
    if let Some(first) = chars.next() {
        if chars.all(|c| c == first) {
            return true;
        }
    }

    if is_sequential_numbers(&lower) {
        return true;
    }

    const KEYBOARD_PATTERNS: &[&str] = &["qwerty", "asdfgh", "zxcvbn", "qazwsx", "1qaz2wsx"];
    if KEYBOARD_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }

    const COMMON_PASSWORDS: &[&str] = &[
        "password",
        "password1",
        "password123",
        "abcdefgh",
        "letmein1",
        "welcome1",
        "iloveyou",
        "sunshine",
        "princess",
        "football",
        "baseball",
        "trustno1",
        "familyhub",
    ];

    COMMON_PASSWORDS.contains(&lower.as_str())
}

/// All-digit strings counting straight up or down, e.g. "12345678"
fn is_sequential_numbers(s: &str) -> bool {
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() < 4 || digits.len() != s.chars().count() {
        return false;
    }

    let is_ascending = digits
        .windows(2)
        .all(|w| w[1] == w[0] + 1 || (w[0] == 9 && w[1] == 0));

    let is_descending = digits
        .windows(2)
        .all(|w| w[0] == w[1] + 1 || (w[0] == 0 && w[1] == 9));

    is_ascending || is_descending
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_too_short() {
        let result = ClearTextPassword::new("short".to_string());
        assert!(matches!(result, Err(PasswordPolicyError::TooShort { .. })));
    }

    #[test]
    fn test_password_too_long() {
        let result = ClearTextPassword::new("ab".repeat(MAX_PASSWORD_LENGTH));
        assert!(matches!(result, Err(PasswordPolicyError::TooLong { .. })));
    }

    #[test]
    fn test_password_whitespace_only() {
        let result = ClearTextPassword::new("        ".to_string());
        assert!(matches!(
            result,
            Err(PasswordPolicyError::EmptyOrWhitespace)
        ));
    }

    #[test]
    fn test_password_control_character() {
        let result = ClearTextPassword::new("abc\u{0007}defghij".to_string());
        assert!(matches!(result, Err(PasswordPolicyError::InvalidCharacter)));
    }

    #[test]
    fn test_password_common_pattern() {
        for weak in ["password123", "qwertyuiop", "12345678", "zzzzzzzzzz"] {
            let result = ClearTextPassword::new(weak.to_string());
            assert!(
                matches!(result, Err(PasswordPolicyError::CommonPattern)),
                "{weak} should be rejected"
            );
        }
    }

    #[test]
    fn test_unicode_password() {
        assert!(ClearTextPassword::new("Küchendienst-Plan!".to_string()).is_ok());
    }

    #[test]
    fn test_hash_and_verify() {
        let password = ClearTextPassword::new("Grocery-List-42".to_string()).unwrap();
        let hashed = password.hash(None).unwrap();

        assert!(hashed.verify(&password, None));

        let wrong = ClearTextPassword::for_verification("Grocery-List-43".to_string());
        assert!(!hashed.verify(&wrong, None));
    }

    #[test]
    fn test_same_password_different_salts() {
        let password = ClearTextPassword::new("Grocery-List-42".to_string()).unwrap();
        let a = password.hash(None).unwrap();
        let b = password.hash(None).unwrap();

        assert_ne!(a.as_phc_string(), b.as_phc_string());
        assert!(a.verify(&password, None));
        assert!(b.verify(&password, None));
    }

    #[test]
    fn test_verification_skips_policy() {
        // Stored before the policy existed; must still verify.
        let legacy = ClearTextPassword::for_verification("short".to_string());
        let hashed = legacy.hash(None).unwrap();
        assert!(hashed.verify(&ClearTextPassword::for_verification("short".to_string()), None));
    }

    #[test]
    fn test_verification_normalizes() {
        // "Å" precomposed vs. "A" + combining ring
        let stored = ClearTextPassword::new("\u{00C5}ngstrom-unit".to_string()).unwrap();
        let hashed = stored.hash(None).unwrap();
        let attempt = ClearTextPassword::for_verification("A\u{030A}ngstrom-unit".to_string());
        assert!(hashed.verify(&attempt, None));
    }

    #[test]
    fn test_hash_with_pepper() {
        let password = ClearTextPassword::new("Grocery-List-42".to_string()).unwrap();
        let pepper = b"household-pepper";
        let hashed = password.hash(Some(pepper)).unwrap();

        assert!(hashed.verify(&password, Some(pepper)));
        assert!(!hashed.verify(&password, None));
        assert!(!hashed.verify(&password, Some(b"other-pepper")));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let password = ClearTextPassword::for_verification("anything".to_string());
        assert!(!HashedPassword::from_stored("not_a_valid_hash").verify(&password, None));
        assert!(!HashedPassword::from_stored("").verify(&password, None));
        assert!(HashedPassword::from_phc_string("not_a_valid_hash").is_err());
    }

    #[test]
    fn test_dummy_hash_rejects_everything() {
        let dummy = HashedPassword::dummy();
        let attempt = ClearTextPassword::for_verification("Grocery-List-42".to_string());
        assert!(!dummy.verify(&attempt, None));
    }

    #[test]
    fn test_debug_redaction() {
        let password = ClearTextPassword::for_verification("secret-value".to_string());
        let debug_output = format!("{:?}", password);
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("secret-value"));
    }
}
