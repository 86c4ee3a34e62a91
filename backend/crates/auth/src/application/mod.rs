//! Application Layer
//!
//! Use cases. Each takes its repositories as `Arc`s, the shared
//! [`AuthConfig`] and a [`platform::clock::Clock`].

mod activity;
pub mod check_session;
pub mod config;
pub mod issue_session;
pub mod prune;
pub mod sign_in;
pub mod sign_out;
pub mod totp_setup;
pub mod user_admin;

pub use check_session::{CheckSessionUseCase, CurrentSession};
pub use config::AuthConfig;
pub use issue_session::{IssueSessionUseCase, IssuedSession};
pub use prune::{PruneReport, PruneUseCase};
pub use sign_in::{SignInInput, SignInOutcome, SignInUseCase, SignedIn};
pub use sign_out::SignOutUseCase;
pub use totp_setup::{TotpEnrollment, TotpSetupUseCase};
pub use user_admin::{CreateUserInput, UserAdminUseCase};
