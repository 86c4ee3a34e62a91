//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Use cases
//! - `infra/` - PostgreSQL and in-memory repositories
//! - `presentation/` - HTTP handlers, DTOs, router, middleware
//!
//! ## Features
//! - Email + password sign-in
//! - Optional TOTP second factor (RFC 6238, authenticator-app compatible)
//! - Server-side sessions behind an opaque cookie token
//! - Double-submit CSRF protection
//! - Admin flag and account activation
//!
//! ## Security Model
//! - Passwords hashed with Argon2id, optional pepper
//! - Only an HMAC-SHA256 digest of each session token is stored
//! - Unknown emails cost one dummy hash, like a wrong password
//! - Pending sign-in and enrollment challenges expire after ten minutes and
//!   burn after five wrong codes

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use infra::{InMemoryAuthRepository, PgAuthRepository};
pub use presentation::router::{
    admin_router, admin_router_generic, auth_router, auth_router_generic,
};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
