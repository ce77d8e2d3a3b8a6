//! Audit Event Entity
//!
//! Append-only record of login/logout attempts. Audit recording is
//! best-effort: a sink failure is logged and swallowed, it never
//! changes an authentication outcome.

use chrono::{DateTime, Utc};
use platform::client::RequestOrigin;
use uuid::Uuid;

use crate::domain::value_object::identity_id::IdentityId;

/// Audited action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Logout,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_id: Uuid,
    /// None when the actor could not be resolved (e.g. unknown email)
    pub actor_id: Option<IdentityId>,
    pub action: AuditAction,
    pub success: bool,
    /// Internal detail; never surfaced to clients
    pub detail: String,
    pub origin_ip: Option<String>,
    pub origin_agent: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    fn new(
        actor_id: Option<IdentityId>,
        action: AuditAction,
        success: bool,
        detail: impl Into<String>,
        origin: &RequestOrigin,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            actor_id,
            action,
            success,
            detail: detail.into(),
            origin_ip: origin.ip_string(),
            origin_agent: origin.user_agent.clone(),
            recorded_at: Utc::now(),
        }
    }

    pub fn login_success(actor_id: IdentityId, origin: &RequestOrigin) -> Self {
        Self::new(
            Some(actor_id),
            AuditAction::Login,
            true,
            "authenticated",
            origin,
        )
    }

    pub fn login_failure(
        actor_id: Option<IdentityId>,
        detail: impl Into<String>,
        origin: &RequestOrigin,
    ) -> Self {
        Self::new(actor_id, AuditAction::Login, false, detail, origin)
    }

    pub fn logout(actor_id: Option<IdentityId>, origin: &RequestOrigin) -> Self {
        Self::new(actor_id, AuditAction::Logout, true, "signed out", origin)
    }
}
