//! Sign Out Use Case
//!
//! Records the logout and nothing else. The handler clears the refresh
//! cookie; outstanding access tokens stay valid until they expire
//! (bearer tokens have no revocation), so from the caller's view this
//! always succeeds.

use std::sync::Arc;

use platform::client::RequestOrigin;
use uuid::Uuid;

use crate::application::emit_audit;
use crate::domain::entity::audit_event::AuditEvent;
use crate::domain::repository::AuditSink;
use crate::domain::value_object::identity_id::IdentityId;

/// Sign out use case
pub struct SignOutUseCase<A>
where
    A: AuditSink + Send + Sync + 'static,
{
    audit: Arc<A>,
}

impl<A> SignOutUseCase<A>
where
    A: AuditSink + Send + Sync + 'static,
{
    pub fn new(audit: Arc<A>) -> Self {
        Self { audit }
    }

    /// `actor_id` is present when the request carried a valid access
    /// token; an anonymous logout is still audited.
    pub fn execute(&self, actor_id: Option<Uuid>, origin: &RequestOrigin) {
        emit_audit(
            &self.audit,
            AuditEvent::logout(actor_id.map(IdentityId::from_uuid), origin),
        );
        tracing::info!("User signed out");
    }
}
