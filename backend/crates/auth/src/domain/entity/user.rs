//! User Entity
//!
//! A household member. Credentials live in [`super::credential::Credential`].

use chrono::{DateTime, Utc};

use crate::domain::value_object::{email::Email, user_id::UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    /// Unique, lowercased
    pub email: Email,
    pub display_name: String,
    pub is_admin: bool,
    /// Inactive members cannot sign in and their sessions stop resolving
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: Email, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: UserId::new(),
            email,
            display_name: display_name.into(),
            is_admin: false,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.last_login_at = Some(now);
        self.updated_at = now;
    }

    pub fn can_login(&self) -> bool {
        self.is_active
    }

    pub fn set_admin(&mut self, is_admin: bool, now: DateTime<Utc>) {
        self.is_admin = is_admin;
        self.updated_at = now;
    }

    pub fn set_active(&mut self, is_active: bool, now: DateTime<Utc>) {
        self.is_active = is_active;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let now = Utc::now();
        let user = User::new(Email::new("kid@example.com").unwrap(), "Kid", now);
        assert!(user.can_login());
        assert!(!user.is_admin);
        assert_eq!(user.last_login_at, None);
        assert_eq!(user.created_at, now);
    }

    #[test]
    fn test_record_login() {
        let now = Utc::now();
        let mut user = User::new(Email::new("kid@example.com").unwrap(), "Kid", now);
        let later = now + chrono::Duration::minutes(5);
        user.record_login(later);
        assert_eq!(user.last_login_at, Some(later));
        assert_eq!(user.updated_at, later);
    }

    #[test]
    fn test_deactivated_user_cannot_login() {
        let now = Utc::now();
        let mut user = User::new(Email::new("kid@example.com").unwrap(), "Kid", now);
        user.set_active(false, now);
        assert!(!user.can_login());
    }
}
