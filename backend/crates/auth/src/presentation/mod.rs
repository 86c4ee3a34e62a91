//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::{AuthAppState, AuthStore};
pub use middleware::{CurrentUser, require_admin, require_csrf, require_session};
pub use router::{admin_router, admin_router_generic, auth_router, auth_router_generic};
