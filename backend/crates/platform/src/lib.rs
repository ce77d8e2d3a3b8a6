//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Password hashing (Argon2id) and password strength policy
//! - Cookie management
//! - Rate limiting (per-operation-class fixed windows)
//! - Client origin extraction (IP / User-Agent)

pub mod client;
pub mod cookie;
pub mod password;
pub mod rate_limit;
