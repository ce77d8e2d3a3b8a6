//! Value Objects

pub mod email;
pub mod identity_id;
pub mod role;
pub mod totp_secret;
