//! TOTP Secret Value Object
//!
//! Authenticator-app compatible settings: SHA1, 6 digits, 30 second step,
//! one step of drift either way. Verification takes the time explicitly so
//! callers can drive it from an injected clock.

use std::fmt;

use chrono::{DateTime, Utc};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{AuthError, AuthResult};

pub const TOTP_DIGITS: usize = 6;
pub const TOTP_STEP_SECS: u64 = 30;
/// Steps accepted on each side of the current one
pub const TOTP_SKEW: u8 = 1;

/// Shorter secrets are rejected by authenticator apps (and by `totp-rs`)
const MIN_SECRET_BYTES: usize = 16;

#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret {
    secret_base32: String,
}

impl TotpSecret {
    /// Fresh 160-bit secret
    pub fn generate() -> Self {
        Self {
            secret_base32: Secret::generate_secret().to_encoded().to_string(),
        }
    }

    /// Parse a base32 secret from storage
    pub fn from_base32(secret: impl Into<String>) -> AuthResult<Self> {
        let secret_base32: String = secret.into();
        let bytes = Secret::Encoded(secret_base32.clone())
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("Invalid TOTP secret: {e:?}")))?;

        if bytes.len() < MIN_SECRET_BYTES {
            return Err(AuthError::Internal("TOTP secret too short".to_string()));
        }

        Ok(Self { secret_base32 })
    }

    pub fn as_base32(&self) -> &str {
        &self.secret_base32
    }

    fn to_totp(&self, issuer: &str, account_name: &str) -> AuthResult<TOTP> {
        let bytes = Secret::Encoded(self.secret_base32.clone())
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("Invalid TOTP secret: {e:?}")))?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP_SECS,
            bytes,
            Some(issuer.to_string()),
            account_name.to_string(),
        )
        .map_err(|e| AuthError::Internal(format!("Failed to create TOTP: {e}")))
    }

    /// Check a submitted code at `now`.
    ///
    /// Whitespace is ignored ("123 456" is accepted). Only the current step and
    /// its immediate neighbours match; anything else, including a code from
    /// two steps ago, is rejected.
    pub fn verify_at(&self, code: &str, now: DateTime<Utc>) -> AuthResult<bool> {
        let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        if code.len() != TOTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        // Issuer and account are not part of the code computation.
        let totp = self.to_totp("totp", "verify")?;
        Ok(totp.check(&code, unix_secs(now)))
    }

    /// Code for the step containing `at`
    pub fn generate_at(&self, at: DateTime<Utc>) -> AuthResult<String> {
        Ok(self.to_totp("totp", "generate")?.generate(unix_secs(at)))
    }

    /// `otpauth://totp/...` URI for authenticator apps
    pub fn provisioning_uri(&self, issuer: &str, account_name: &str) -> AuthResult<String> {
        Ok(self.to_totp(issuer, account_name)?.get_url())
    }

    /// Base64-encoded PNG of the provisioning URI
    pub fn qr_code_base64(&self, issuer: &str, account_name: &str) -> AuthResult<String> {
        self.to_totp(issuer, account_name)?
            .get_qr_base64()
            .map_err(|e| AuthError::Internal(format!("Failed to generate QR code: {e}")))
    }
}

fn unix_secs(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TotpSecret")
            .field("secret_base32", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    // Middle of a step, far from the epoch
    const NOW: i64 = 1_750_000_015;

    #[test]
    fn test_generate_is_random_and_parsable() {
        let a = TotpSecret::generate();
        let b = TotpSecret::generate();
        assert_ne!(a, b);
        assert_eq!(TotpSecret::from_base32(a.as_base32()).unwrap(), a);
    }

    #[test]
    fn test_from_base32_rejects_garbage() {
        assert!(TotpSecret::from_base32("not base32 !!").is_err());
        assert!(TotpSecret::from_base32("JBSWY3DP").is_err()); // 5 bytes
    }

    #[test]
    fn test_current_code_verifies() {
        let secret = TotpSecret::generate();
        let code = secret.generate_at(at(NOW)).unwrap();
        assert!(secret.verify_at(&code, at(NOW)).unwrap());
    }

    #[test]
    fn test_adjacent_steps_verify() {
        let secret = TotpSecret::generate();
        let step = Duration::seconds(TOTP_STEP_SECS as i64);

        let previous = secret.generate_at(at(NOW) - step).unwrap();
        let next = secret.generate_at(at(NOW) + step).unwrap();
        assert!(secret.verify_at(&previous, at(NOW)).unwrap());
        assert!(secret.verify_at(&next, at(NOW)).unwrap());
    }

    #[test]
    fn test_two_steps_away_rejected() {
        let secret = TotpSecret::generate();
        let step = Duration::seconds(TOTP_STEP_SECS as i64);
        let now = at(NOW);

        let old = secret.generate_at(now - step * 2).unwrap();
        let future = secret.generate_at(now + step * 2).unwrap();
        let current = secret.generate_at(now).unwrap();

        // Codes can collide by chance; only assert when they differ.
        if old != current && old != secret.generate_at(now - step).unwrap() {
            assert!(!secret.verify_at(&old, now).unwrap());
        }
        if future != current && future != secret.generate_at(now + step).unwrap() {
            assert!(!secret.verify_at(&future, now).unwrap());
        }
    }

    #[test]
    fn test_whitespace_is_stripped() {
        let secret = TotpSecret::generate();
        let code = secret.generate_at(at(NOW)).unwrap();
        let spaced = format!(" {} {} ", &code[..3], &code[3..]);
        assert!(secret.verify_at(&spaced, at(NOW)).unwrap());
    }

    #[test]
    fn test_malformed_codes_rejected() {
        let secret = TotpSecret::generate();
        for bad in ["", "12345", "1234567", "abcdef"] {
            assert!(!secret.verify_at(bad, at(NOW)).unwrap());
        }
    }

    #[test]
    fn test_provisioning_uri() {
        let secret = TotpSecret::from_base32("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP").unwrap();
        let uri = secret
            .provisioning_uri("FamilyHub", "mum@example.com")
            .unwrap();

        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains("secret=JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP"));
        assert!(uri.contains("issuer=FamilyHub"));
        assert_eq!(
            uri,
            secret
                .provisioning_uri("FamilyHub", "mum@example.com")
                .unwrap()
        );
    }

    #[test]
    fn test_qr_code() {
        let secret = TotpSecret::generate();
        let qr = secret.qr_code_base64("FamilyHub", "mum@example.com").unwrap();
        assert!(!qr.is_empty());
    }

    #[test]
    fn test_debug_redaction() {
        let secret = TotpSecret::from_base32("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP").unwrap();
        assert!(!format!("{secret:?}").contains("JBSWY3DP"));
    }
}
