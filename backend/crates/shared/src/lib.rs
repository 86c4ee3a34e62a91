//! Shared Kernel
//!
//! Vocabulary shared by every backend crate:
//! - the unified [`error::app_error::AppError`] and its [`error::kind::ErrorKind`]
//! - typed identifiers ([`id::Id`])
//!
//! Only things whose meaning is the same in every domain belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
