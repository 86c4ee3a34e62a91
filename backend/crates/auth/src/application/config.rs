//! Application Configuration
//!
//! Everything the authority needs is injected through [`AuthConfig`]; nothing
//! is read from the environment here.

use std::fmt;

use chrono::Duration;
use platform::cookie::CookieConfig;

pub use platform::cookie::SameSite;

#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC key for token digests (32 bytes)
    pub secret_key: [u8; 32],
    /// Session lifetime from issue (14 days)
    pub session_ttl: Duration,
    /// Pending sign-in / enrollment lifetime (10 minutes)
    pub pending_ttl: Duration,
    pub session_cookie_name: String,
    pub csrf_cookie_name: String,
    /// Cookie carrying the pending sign-in token between password and code
    pub mfa_cookie_name: String,
    /// Shown by authenticator apps
    pub totp_issuer: String,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    /// Optional application-wide secret appended before hashing
    pub password_pepper: Option<Vec<u8>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: [0u8; 32],
            session_ttl: Duration::days(14),
            pending_ttl: Duration::minutes(10),
            session_cookie_name: "fh_session".to_string(),
            csrf_cookie_name: "fh_csrf".to_string(),
            mfa_cookie_name: "fh_mfa".to_string(),
            totp_issuer: "FamilyHub".to_string(),
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            password_pepper: None,
        }
    }
}

impl AuthConfig {
    /// Config with a random secret key (development and tests)
    pub fn with_random_secret() -> Self {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self {
            secret_key: secret,
            ..Default::default()
        }
    }

    /// Random key, cookies without `Secure`
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    pub fn pepper(&self) -> Option<Vec<u8>> {
        self.password_pepper.clone()
    }

    pub fn session_cookie(&self) -> CookieConfig {
        CookieConfig {
            max_age_secs: Some(self.session_ttl.num_seconds()),
            ..self.cookie(&self.session_cookie_name, true)
        }
    }

    pub fn mfa_cookie(&self) -> CookieConfig {
        CookieConfig {
            max_age_secs: Some(self.pending_ttl.num_seconds()),
            ..self.cookie(&self.mfa_cookie_name, true)
        }
    }

    /// Readable by scripts so the frontend can echo it in a header
    pub fn csrf_cookie(&self) -> CookieConfig {
        self.cookie(&self.csrf_cookie_name, false)
    }

    fn cookie(&self, name: &str, http_only: bool) -> CookieConfig {
        CookieConfig {
            name: name.to_string(),
            secure: self.cookie_secure,
            http_only,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
            max_age_secs: None,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"[REDACTED]")
            .field("session_ttl", &self.session_ttl)
            .field("pending_ttl", &self.pending_ttl)
            .field("session_cookie_name", &self.session_cookie_name)
            .field("csrf_cookie_name", &self.csrf_cookie_name)
            .field("mfa_cookie_name", &self.mfa_cookie_name)
            .field("totp_issuer", &self.totp_issuer)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("password_pepper", &self.password_pepper.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.session_ttl, Duration::days(14));
        assert_eq!(config.session_cookie_name, "fh_session");
    }

    #[test]
    fn test_random_secrets_differ() {
        assert_ne!(
            AuthConfig::with_random_secret().secret_key,
            AuthConfig::with_random_secret().secret_key
        );
    }

    #[test]
    fn test_cookie_attributes() {
        let config = AuthConfig::development();

        let session = config.session_cookie();
        assert!(session.http_only);
        assert!(!session.secure);
        assert_eq!(session.max_age_secs, Some(14 * 24 * 3600));

        assert!(!config.csrf_cookie().http_only);
        assert_eq!(config.mfa_cookie().max_age_secs, Some(600));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AuthConfig {
            password_pepper: Some(b"pepper-value".to_vec()),
            ..AuthConfig::with_random_secret()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("pepper-value"));
        assert!(debug.contains("REDACTED"));
    }
}
