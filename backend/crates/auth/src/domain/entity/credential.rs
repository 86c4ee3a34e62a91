//! Credential Entity
//!
//! Password hash and second-factor state, 1:1 with a user.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{
    totp_secret::TotpSecret, user_id::UserId, user_password::UserPassword,
};

#[derive(Debug, Clone)]
pub struct Credential {
    pub user_id: UserId,
    pub password_hash: UserPassword,
    /// Only a confirmed secret is ever stored here
    pub totp_secret: Option<TotpSecret>,
    pub totp_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(user_id: UserId, password_hash: UserPassword, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            password_hash,
            totp_secret: None,
            totp_enabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The secret to check codes against, if the second factor is on
    pub fn active_totp(&self) -> Option<&TotpSecret> {
        if self.totp_enabled {
            self.totp_secret.as_ref()
        } else {
            None
        }
    }

    pub fn requires_totp(&self) -> bool {
        self.active_totp().is_some()
    }

    pub fn set_password(&mut self, password_hash: UserPassword, now: DateTime<Utc>) {
        self.password_hash = password_hash;
        self.updated_at = now;
    }

    pub fn enable_totp(&mut self, secret: TotpSecret, now: DateTime<Utc>) {
        self.totp_secret = Some(secret);
        self.totp_enabled = true;
        self.updated_at = now;
    }

    pub fn disable_totp(&mut self, now: DateTime<Utc>) {
        self.totp_secret = None;
        self.totp_enabled = false;
        self.updated_at = now;
    }
}
