//! Domain Layer
//!
//! Entities, value objects and the storage traits the use cases depend on.

pub mod entity;
pub mod repository;
pub mod value_object;

pub use entity::{
    activity_entry::ActivityEntry,
    auth_session::AuthSession,
    credential::Credential,
    pending_challenge::{ChallengePurpose, PendingChallenge},
    user::User,
};
pub use repository::{
    ActivityLogRepository, AuthSessionRepository, CredentialRepository,
    PendingChallengeRepository, UserRepository,
};
