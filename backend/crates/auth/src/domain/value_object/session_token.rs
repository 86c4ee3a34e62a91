//! Session Token Value Objects
//!
//! A [`SessionToken`] is the bearer credential handed to the client. The store
//! only ever sees its [`TokenDigest`]: `HMAC-SHA256(secret_key, token)`.
//! Pending challenge tokens use the same pair.

use std::fmt;

use platform::crypto::{hmac_sha256, random_token};

/// 32 bytes of entropy, base64url encoded (43 chars)
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Opaque bearer token. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(random_token(SESSION_TOKEN_BYTES))
    }

    /// Wrap a token presented by a client. Unknown tokens simply fail lookup.
    pub fn from_client(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn digest(&self, secret_key: &[u8]) -> TokenDigest {
        TokenDigest(hmac_sha256(secret_key, self.0.as_bytes()))
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&"[REDACTED]").finish()
    }
}

/// Store key derived from a token
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenDigest([u8; 32]);

impl TokenDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Rows with a digest of the wrong length are treated as corrupt.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A prefix is enough to correlate log lines.
        write!(
            f,
            "TokenDigest({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}
