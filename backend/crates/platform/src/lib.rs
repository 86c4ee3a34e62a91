//! Platform Crate - Technical Infrastructure
//!
//! Shared technical building blocks with no household vocabulary:
//! - Cryptographic utilities (random tokens, SHA-256, HMAC, constant-time eq)
//! - Password hashing (Argon2id)
//! - Cookie building/parsing
//! - CSRF double-submit tokens
//! - An injectable clock

pub mod clock;
pub mod cookie;
pub mod crypto;
pub mod csrf;
pub mod password;
