//! Identity Entity
//!
//! One back-office account. Identities are created out-of-band by an
//! administrator; the authentication core only reads them and advances
//! their TOTP enrollment state.
//!
//! TOTP state machine:
//! - `totp_secret = None`: enrollment never started
//! - `Some(secret)`, `totp_enabled = false`: pending enrollment; the
//!   secret may be regenerated (overwritten) until first confirmation
//! - `totp_enabled = true, totp_verified = true`: confirmed; both flags
//!   flip together exactly once and the secret is frozen
//!
//! Invariant: `totp_verified` implies `totp_enabled`.

use chrono::{DateTime, Utc};
use platform::password::HashedPassword;

use crate::domain::value_object::{
    email::Email, identity_id::IdentityId, role::Role, totp_secret::TotpSecret,
};

/// Back-office identity record
#[derive(Debug, Clone)]
pub struct Identity {
    pub identity_id: IdentityId,
    pub email: Email,
    pub full_name: String,
    pub password_hash: HashedPassword,
    pub totp_secret: Option<TotpSecret>,
    pub totp_enabled: bool,
    pub totp_verified: bool,
    pub active: bool,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Create a fresh identity (no TOTP enrollment yet)
    pub fn new(email: Email, full_name: String, password_hash: HashedPassword, role: Role) -> Self {
        let now = Utc::now();
        Self {
            identity_id: IdentityId::new(),
            email,
            full_name,
            password_hash,
            totp_secret: None,
            totp_enabled: false,
            totp_verified: false,
            active: true,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Deactivated identities never authenticate; this check pre-empts
    /// every other one.
    pub fn can_authenticate(&self) -> bool {
        self.active
    }

    /// Whether a login must answer the TOTP challenge (as opposed to
    /// starting enrollment)
    pub fn totp_confirmed(&self) -> bool {
        self.totp_enabled
    }

    /// Confirm enrollment: both flags flip together. The persistent
    /// counterpart is a single conditional update in the store.
    pub fn confirm_totp(&mut self) {
        self.totp_enabled = true;
        self.totp_verified = true;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::password::{ClearTextPassword, HashingParams, PasswordHasher};

    fn test_identity() -> Identity {
        let hasher = PasswordHasher::new(
            HashingParams {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            None,
        )
        .unwrap();
        let password = ClearTextPassword::new("Str0ng!Passw0rd".to_string()).unwrap();
        Identity::new(
            Email::new("broker@example.com").unwrap(),
            "Avery Broker".to_string(),
            hasher.hash(&password).unwrap(),
            Role::User,
        )
    }

    #[test]
    fn test_new_identity_has_no_totp() {
        let identity = test_identity();
        assert!(identity.totp_secret.is_none());
        assert!(!identity.totp_enabled);
        assert!(!identity.totp_verified);
        assert!(identity.can_authenticate());
    }

    #[test]
    fn test_confirm_flips_both_flags() {
        let mut identity = test_identity();
        identity.totp_secret = Some(TotpSecret::generate());
        assert!(!identity.totp_confirmed());

        identity.confirm_totp();
        assert!(identity.totp_enabled);
        assert!(identity.totp_verified);
        assert!(identity.totp_confirmed());
    }

    #[test]
    fn test_deactivated_identity_cannot_authenticate() {
        let mut identity = test_identity();
        identity.active = false;
        assert!(!identity.can_authenticate());
    }
}
