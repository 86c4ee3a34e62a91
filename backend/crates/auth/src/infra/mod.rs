//! Infrastructure Layer
//!
//! Repository implementations: PostgreSQL for the server, an in-memory
//! store for tests.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryAuthRepository;
pub use postgres::PgAuthRepository;
