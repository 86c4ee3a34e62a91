//! Entity Module

pub mod activity_entry;
pub mod auth_session;
pub mod credential;
pub mod pending_challenge;
pub mod user;
