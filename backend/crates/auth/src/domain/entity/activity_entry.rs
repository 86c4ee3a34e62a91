//! Activity Entry Entity
//!
//! Append-only audit row. The household screens write their own entries; the
//! auth core writes the ones below.

use chrono::{DateTime, Utc};
use kernel::id::ActivityEntryId;
use serde_json::Value;

use crate::domain::entity::user::User;
use crate::domain::value_object::user_id::UserId;

pub mod actions {
    pub const SIGN_IN: &str = "auth.sign_in";
    pub const SIGN_OUT: &str = "auth.sign_out";
    pub const TOTP_ENABLED: &str = "auth.totp_enabled";
    pub const TOTP_DISABLED: &str = "auth.totp_disabled";
    pub const USER_CREATED: &str = "user.created";
    pub const PASSWORD_CHANGED: &str = "user.password_changed";
    pub const ROLE_CHANGED: &str = "user.role_changed";
    pub const STATUS_CHANGED: &str = "user.status_changed";
}

#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub id: ActivityEntryId,
    pub occurred_at: DateTime<Utc>,
    pub actor_user_id: Option<UserId>,
    pub actor_email: Option<String>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<Value>,
}

impl ActivityEntry {
    pub fn new(action: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ActivityEntryId::new(),
            occurred_at: now,
            actor_user_id: None,
            actor_email: None,
            action: action.into(),
            entity_type: None,
            entity_id: None,
            details: None,
        }
    }

    pub fn actor(mut self, user: &User) -> Self {
        self.actor_user_id = Some(user.user_id);
        self.actor_email = Some(user.email.to_string());
        self
    }

    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
