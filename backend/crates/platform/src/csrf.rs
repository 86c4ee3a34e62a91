//! CSRF double-submit tokens
//!
//! The token lives in a script-readable cookie and must be echoed back in a
//! header or form field. A cross-site attacker can make the browser send the
//! cookie but cannot read it to echo it.

use crate::crypto::{constant_time_eq, random_token};

/// Bytes of entropy in a CSRF token
pub const CSRF_TOKEN_BYTES: usize = 16;

/// Header carrying the echoed token
pub const CSRF_HEADER: &str = "x-csrf-token";

pub fn generate_csrf_token() -> String {
    random_token(CSRF_TOKEN_BYTES)
}

/// Both sides must be present, non-empty and equal.
pub fn csrf_matches(cookie_token: Option<&str>, submitted: Option<&str>) -> bool {
    match (cookie_token, submitted) {
        (Some(cookie), Some(submitted)) if !cookie.is_empty() => {
            constant_time_eq(cookie.as_bytes(), submitted.as_bytes())
        }
        _ => false,
    }
}
