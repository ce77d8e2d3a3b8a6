//! Authentication Core
//!
//! Back-office authentication for the brokerage API: password
//! verification (Argon2id), mandatory TOTP second factor with QR
//! provisioning, stateless JWT access/refresh token pair, per-class
//! rate limiting, and append-only audit events.
//!
//! Layered in the usual shape:
//! - `domain`: entities, value objects, repository traits
//! - `application`: use cases (sign-in, TOTP verify, refresh, logout)
//! - `infra`: PostgreSQL repository implementations
//! - `presentation`: axum handlers, DTOs, router, middleware
//! - `token`: JWT issuance and verification

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;
pub mod token;

pub use application::config::AuthConfig;
pub use infra::postgres::{PgAuditSink, PgIdentityRepository};
pub use presentation::router::auth_router;

#[cfg(test)]
mod tests;
