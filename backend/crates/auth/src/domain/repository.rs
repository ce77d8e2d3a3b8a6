//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use crate::domain::entity::{audit_event::AuditEvent, identity::Identity};
use crate::domain::value_object::{
    email::Email, identity_id::IdentityId, totp_secret::TotpSecret,
};
use crate::error::AuthResult;

/// Identity repository trait
#[trait_variant::make(IdentityRepository: Send)]
pub trait LocalIdentityRepository {
    /// Find identity by normalized email
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<Identity>>;

    /// Find identity by ID
    async fn find_by_id(&self, identity_id: &IdentityId) -> AuthResult<Option<Identity>>;

    /// Persist a freshly generated enrollment secret. Only applies
    /// while the identity's TOTP is still unconfirmed.
    async fn store_totp_secret(
        &self,
        identity_id: &IdentityId,
        secret: &TotpSecret,
    ) -> AuthResult<()>;

    /// Atomically flip `totp_enabled` and `totp_verified` together,
    /// only if still unconfirmed. Returns whether this call did the
    /// flip (false means a concurrent confirmation won).
    async fn confirm_totp(&self, identity_id: &IdentityId) -> AuthResult<bool>;
}

/// Append-only audit sink trait
#[trait_variant::make(AuditSink: Send)]
pub trait LocalAuditSink {
    /// Append one audit record
    async fn record(&self, event: &AuditEvent) -> AuthResult<()>;
}
